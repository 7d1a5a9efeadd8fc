use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use taskboard_crypto::SecretHasher;
use taskboard_db::Database;
use taskboard_invites::InviteService;
use taskboard_types::api::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use taskboard_types::models::Claims;

use crate::error::{ApiError, blocking};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub invites: InviteService,
    pub passwords: SecretHasher,
    pub jwt_secret: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::bad_request("username must be 3 to 32 characters"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::bad_request("password must be at least 8 characters"));
    }

    let user_id = Uuid::new_v4();
    let worker = state.clone();
    let username = req.username.clone();
    blocking(move || {
        let password_hash = worker.passwords.hash(&req.password)?;
        let created = worker.db.create_user(
            &user_id.to_string(),
            &username,
            &password_hash,
            Utc::now(),
        )?;
        if !created {
            return Err(ApiError::new(StatusCode::CONFLICT, "username is taken"));
        }
        Ok(())
    })
    .await?;

    info!("User {} registered as {}", user_id, req.username);
    let token = create_token(&state.jwt_secret, user_id, &req.username)?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let worker = state.clone();
    let user = blocking(move || {
        let user = worker
            .db
            .get_user_by_username(&req.username)?
            .ok_or_else(ApiError::unauthorized)?;
        if !worker.passwords.verify(&req.password, &user.password) {
            return Err(ApiError::unauthorized());
        }
        Ok(user)
    })
    .await?;

    let user_id = user.id.parse::<Uuid>().map_err(ApiError::internal)?;
    let token = create_token(&state.jwt_secret, user_id, &user.username)?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}

pub fn create_token(secret: &str, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
