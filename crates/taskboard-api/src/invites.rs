use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use taskboard_invites::{Delivery, IssuedInvite};
use taskboard_types::api::{
    AcceptInviteRequest, AcceptInviteResponse, CreateInviteRequest, CreateInviteResponse,
    DeliveryStatus, InvitePreviewResponse, InviteSummary, ValidateInviteQuery,
};
use taskboard_types::models::Claims;

use crate::auth::AppState;
use crate::error::ApiError;

fn issued_response(issued: IssuedInvite) -> CreateInviteResponse {
    let delivery = match issued.delivery {
        Delivery::Sent => DeliveryStatus::Sent,
        Delivery::Failed(reason) => DeliveryStatus::Failed { reason },
    };
    CreateInviteResponse {
        invite_id: issued.invite_id,
        expires_at: issued.expires_at,
        delivery,
    }
}

pub async fn create_invite(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateInviteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.invites.require_owner(board_id, claims.sub).await?;

    let email = req.email.unwrap_or_default();
    let issued = state
        .invites
        .create_invite(board_id, &email, req.role, claims.sub)
        .await?;

    Ok((StatusCode::CREATED, Json(issued_response(issued))))
}

pub async fn list_invites(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<InviteSummary>>, ApiError> {
    state.invites.require_owner(board_id, claims.sub).await?;

    let invites = state.invites.list_invites(board_id).await?;
    Ok(Json(invites.iter().map(InviteSummary::from).collect()))
}

pub async fn cancel_invite(
    State(state): State<AppState>,
    Path((board_id, invite_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    state.invites.require_owner(board_id, claims.sub).await?;
    state
        .invites
        .cancel_invite(board_id, invite_id, claims.sub)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn resend_invite(
    State(state): State<AppState>,
    Path((board_id, invite_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<CreateInviteResponse>, ApiError> {
    state.invites.require_owner(board_id, claims.sub).await?;
    let issued = state
        .invites
        .resend_invite(board_id, invite_id, claims.sub)
        .await?;
    Ok(Json(issued_response(issued)))
}

/// Public: the invite link lands here before the recipient has logged in.
pub async fn validate_invite(
    State(state): State<AppState>,
    Query(query): Query<ValidateInviteQuery>,
) -> Result<Json<InvitePreviewResponse>, ApiError> {
    let token = query.token.unwrap_or_default();
    let preview = state.invites.validate_invite(&token).await?;

    Ok(Json(InvitePreviewResponse {
        board_id: preview.board_id,
        board_title: preview.board_title,
        email: preview.email,
        role: preview.role,
        expires_at: preview.expires_at,
    }))
}

pub async fn accept_invite(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AcceptInviteRequest>,
) -> Result<Json<AcceptInviteResponse>, ApiError> {
    let token = req.token.unwrap_or_default();
    let board_id = state.invites.accept_invite(&token, claims.sub).await?;
    Ok(Json(AcceptInviteResponse { board_id }))
}
