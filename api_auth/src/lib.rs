use middleware::auth::AuthMiddleware;

pub mod middleware {
    pub mod auth;
}

/// Bearer JWT guard for operator routes. Reads `web::Data<JwtConfig>` from app data.
pub fn auth_middleware() -> AuthMiddleware {
    AuthMiddleware::new()
}
