use actix_web::{HttpResponse, get, http::StatusCode, post, web};
use common::{
    error::{AppError, Res},
    http::Success,
    jwt::JwtClaims,
};
use serde_json::json;

use crate::{
    dtos::key::{
        ApiKeyRequest, CreateKeyRequest, ListKeysQuery, ListKeysResponse, PresentedKeyResponse,
        RevokeKeyResponse, StatusResponse, ValidateKeyResponse, as_integer,
    },
    middleware::key::PresentedKey,
    service::key::KeyManager,
};

/// Issues a new API key.
///
/// # Arguments
///
/// * `claims` - The JWT claims of the authenticated operator.
/// * `manager` - The key lifecycle manager.
/// * `req` - Optional owner, validity window in minutes and key length.
///
/// # Returns
///
/// `201` with `{api_key, expires_in_minutes, owner}`. The plaintext key is
/// never retrievable again. `409` if the key already exists, `500` if it
/// could not be stored.
#[post("", wrap = "api_auth::auth_middleware()")]
pub async fn post_create_key(
    claims: web::ReqData<JwtClaims>,
    manager: web::Data<KeyManager>,
    req: web::Json<CreateKeyRequest>,
) -> Res<HttpResponse> {
    let req = req.into_inner();
    let created = manager
        .issue(
            as_integer(req.minutes.as_ref()),
            req.owner,
            as_integer(req.length.as_ref()),
        )
        .await?;
    log::info!("API key issued by {} for owner={:?}", claims.sub, created.owner);
    Success::created(created)
}

/// Lists stored keys, optionally only those of one owner.
///
/// # Returns
///
/// `200` with `{keys: [...]}`. Records never include plaintext keys.
#[get("", wrap = "api_auth::auth_middleware()")]
pub async fn get_keys(
    manager: web::Data<KeyManager>,
    query: web::Query<ListKeysQuery>,
) -> Res<HttpResponse> {
    let owner = query.owner.as_deref().filter(|owner| !owner.is_empty());
    let keys = manager.list(owner).await?;
    Success::ok(ListKeysResponse { keys })
}

/// Checks a key and returns what is known about it.
///
/// # Returns
///
/// `200` with `{valid: true, info}` or `401` with `{valid: false, info}`;
/// `info` is `{}` for unknown keys. `400` if `api_key` is missing.
#[post("/validate")]
pub async fn post_validate(
    manager: web::Data<KeyManager>,
    req: web::Json<ApiKeyRequest>,
) -> Res<HttpResponse> {
    let key = req
        .key()
        .ok_or_else(|| AppError::BadRequest("api_key missing or invalid".to_string()))?;

    let valid = manager.validate(key).await;
    let info = match manager.get_info(key).await {
        Some(record) => serde_json::to_value(record)?,
        None => json!({}),
    };

    let status = if valid {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    };
    Success::with_status(status, ValidateKeyResponse { valid, info })
}

/// Revokes a key given either in plaintext or as its hash.
///
/// # Returns
///
/// `200` with `{revoked: true}`, or `404` with `{revoked: false}` when there
/// was nothing live to revoke.
#[post("/revoke", wrap = "api_auth::auth_middleware()")]
pub async fn post_revoke(
    claims: web::ReqData<JwtClaims>,
    manager: web::Data<KeyManager>,
    req: web::Json<ApiKeyRequest>,
) -> Res<HttpResponse> {
    let key = req
        .key()
        .ok_or_else(|| AppError::BadRequest("api_key missing or invalid".to_string()))?;

    let revoked = manager.revoke(key).await;
    if revoked {
        log::info!("API key revoked by {}", claims.sub);
        Success::ok(RevokeKeyResponse { revoked })
    } else {
        Success::with_status(StatusCode::NOT_FOUND, RevokeKeyResponse { revoked })
    }
}

/// Describes the key the request was authorized with. Must sit behind the key middleware.
#[get("/key")]
pub async fn get_presented_key(
    presented: web::ReqData<PresentedKey>,
    manager: web::Data<KeyManager>,
) -> Res<HttpResponse> {
    let key = presented.0.as_str();
    let info = manager.get_info(key).await;
    let expires_in_seconds = manager
        .expires_in(key)
        .await
        .map(|remaining| remaining.num_seconds());
    Success::ok(PresentedKeyResponse {
        info,
        expires_in_seconds,
    })
}

#[get("/")]
pub async fn get_status(manager: web::Data<KeyManager>) -> Res<HttpResponse> {
    Success::ok(StatusResponse {
        status: "API running".to_string(),
        backend: manager.backend_name().await.to_string(),
    })
}
