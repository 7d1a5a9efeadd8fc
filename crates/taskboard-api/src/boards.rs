use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use taskboard_db::models::{BoardRow, parse_ts};
use taskboard_types::api::{BoardResponse, CreateBoardRequest, MemberResponse};
use taskboard_types::models::{Claims, Role};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

const MAX_TITLE_LEN: usize = 200;

fn board_response(row: &BoardRow, role: Role) -> anyhow::Result<BoardResponse> {
    Ok(BoardResponse {
        id: row.id.parse()?,
        title: row.title.clone(),
        owner_id: row.owner_id.parse()?,
        role,
        created_at: parse_ts(&row.created_at)?,
    })
}

pub async fn create_board(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateBoardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.trim().to_string();
    if title.is_empty() || title.len() > MAX_TITLE_LEN {
        return Err(ApiError::bad_request("title must be 1 to 200 characters"));
    }

    let board_id = Uuid::new_v4();
    let now = Utc::now();
    let owner = claims.sub.to_string();
    let db = state.db.clone();
    let row = blocking(move || {
        db.create_board(&board_id.to_string(), &title, &owner, now)?;
        db.get_board(&board_id.to_string())?
            .ok_or_else(|| ApiError::internal("board vanished after insert"))
    })
    .await?;

    info!("Board {} created by {}", board_id, claims.username);
    Ok((StatusCode::CREATED, Json(board_response(&row, Role::Owner)?)))
}

/// Boards the caller owns or belongs to, newest first. The owner's role is
/// reported from ownership even if their membership row has drifted.
pub async fn list_boards(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<BoardResponse>>, ApiError> {
    let me = claims.sub.to_string();
    let db = state.db.clone();
    let rows = blocking(move || Ok(db.list_boards_for_user(&me)?)).await?;

    let me = claims.sub.to_string();
    let boards = rows
        .iter()
        .map(|(board, stored)| -> anyhow::Result<BoardResponse> {
            let role = match stored {
                _ if board.owner_id == me => Role::Owner,
                Some(raw) => raw.parse::<Role>()?,
                None => Role::LOWEST,
            };
            board_response(board, role)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(boards))
}

pub async fn get_board(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<BoardResponse>, ApiError> {
    let reconciled = state.invites.ensure_membership(board_id, claims.sub).await?;

    let db = state.db.clone();
    let row = blocking(move || {
        db.get_board(&board_id.to_string())?
            .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "board not found"))
    })
    .await?;

    Ok(Json(board_response(&row, reconciled.role)?))
}

pub async fn list_members(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<MemberResponse>>, ApiError> {
    state.invites.ensure_membership(board_id, claims.sub).await?;

    let db = state.db.clone();
    let rows = blocking(move || Ok(db.list_members(&board_id.to_string())?)).await?;

    let members = rows
        .iter()
        .map(|row| -> anyhow::Result<MemberResponse> {
            Ok(MemberResponse {
                user_id: row.user_id.parse()?,
                username: row.username.clone(),
                role: row.role()?,
                joined_at: parse_ts(&row.created_at)?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(members))
}
