use std::{future::Future, pin::Pin, sync::Arc};

use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    web,
};
use common::{
    env_config::JwtConfig,
    error::AppError,
    jwt::{bearer_token, validate_jwt},
};
use futures::future::{Ready, ok};

#[derive(Default)]
pub struct AuthMiddleware;

impl AuthMiddleware {
    pub fn new() -> Self {
        AuthMiddleware
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddlewareService {
            service: Arc::new(service),
        })
    }
}

pub struct AuthMiddlewareService<S> {
    service: Arc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = Arc::clone(&self.service);

        Box::pin(async move {
            let Some(config) = req.app_data::<web::Data<JwtConfig>>().cloned() else {
                return Ok(req.error_response(AppError::Internal(
                    "JWT configuration is missing".to_string(),
                )));
            };

            // no token passed - 401
            let Some(token) = bearer_token(req.headers()).map(str::to_string) else {
                return Ok(req.error_response(AppError::Unauthorized(
                    "No authorization token provided".to_string(),
                )));
            };

            // validate token and insert claims to request object for handlers
            match validate_jwt(&token, &config.secret) {
                Ok(claims) => {
                    req.extensions_mut().insert(claims);
                    srv.call(req).await.map(|res| res.map_into_boxed_body())
                }
                Err(error) => {
                    log::warn!("Rejected bearer token for {}: {}", req.path(), error);
                    Ok(req.error_response(AppError::Unauthorized("Invalid token".to_string())))
                }
            }
        })
    }
}
