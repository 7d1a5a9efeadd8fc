use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use uuid::Uuid;

use taskboard_db::models::parse_ts;
use taskboard_types::api::AuditEventResponse;
use taskboard_types::models::{AuditAction, Claims};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

const MAX_LIMIT: u32 = 200;

/// Owner-only view of the board's invite and membership history.
pub async fn list_audit(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEventResponse>>, ApiError> {
    state.invites.require_owner(board_id, claims.sub).await?;

    let limit = query.limit.clamp(1, MAX_LIMIT);
    let db = state.db.clone();
    let rows = blocking(move || Ok(db.list_audit(&board_id.to_string(), limit)?)).await?;

    let events = rows
        .iter()
        .map(|row| -> anyhow::Result<AuditEventResponse> {
            let action = AuditAction::parse(&row.action)
                .ok_or_else(|| anyhow::anyhow!("unknown audit action {:?}", row.action))?;
            Ok(AuditEventResponse {
                id: row.id.parse()?,
                actor_id: row.actor_id.as_deref().map(str::parse::<Uuid>).transpose()?,
                action,
                detail: row.detail.clone(),
                created_at: parse_ts(&row.created_at)?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(events))
}
