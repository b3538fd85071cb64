use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header::HeaderMap,
    web,
};
use common::error::AppError;
use futures::future::{Ready, ok};
use std::{future::Future, pin::Pin, sync::Arc};

use crate::service::key::KeyManager;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// The key a request was authorized with, available to handlers behind the gate.
#[derive(Debug, Clone)]
pub struct PresentedKey(pub String);

/// Reads the API key header, rejecting values that are missing, empty or longer than `max_length`.
pub fn presented_key(headers: &HeaderMap, max_length: usize) -> Option<&str> {
    let key = headers.get(API_KEY_HEADER)?.to_str().ok()?;
    if key.is_empty() || key.len() > max_length {
        return None;
    }
    Some(key)
}

/// Whether the request headers carry a valid API key.
pub async fn is_authorized(headers: &HeaderMap, manager: &KeyManager, max_length: usize) -> bool {
    match presented_key(headers, max_length) {
        Some(key) => manager.validate(key).await,
        None => false,
    }
}

// KeyMiddleware struct (as a Transform)
pub struct KeyMiddleware {
    max_key_length: usize,
}

impl KeyMiddleware {
    pub fn new(max_key_length: usize) -> Self {
        KeyMiddleware { max_key_length }
    }
}

// Implement the Transform trait for KeyMiddleware
impl<S, B> Transform<S, ServiceRequest> for KeyMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = KeyMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(KeyMiddlewareService {
            service: Arc::new(service),
            max_key_length: self.max_key_length,
        })
    }
}

// Service struct for the middleware
pub struct KeyMiddlewareService<S> {
    service: Arc<S>,
    max_key_length: usize,
}

// Implement the Service trait for KeyMiddlewareService
impl<S, B> Service<ServiceRequest> for KeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    actix_web::dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = Arc::clone(&self.service);
        let max_key_length = self.max_key_length;

        Box::pin(async move {
            let Some(manager) = req.app_data::<web::Data<KeyManager>>().cloned() else {
                return Ok(req.error_response(AppError::Internal(
                    "Key manager is not configured".to_string(),
                )));
            };

            let authorized = is_authorized(req.headers(), &manager, max_key_length).await;
            let key = match presented_key(req.headers(), max_key_length) {
                Some(key) if authorized => key.to_string(),
                Some(key) => {
                    log::warn!(
                        "Rejected API key {} for {}",
                        manager.generator().preview(key),
                        req.path()
                    );
                    return Ok(req.error_response(AppError::Unauthorized(
                        "Invalid API key".to_string(),
                    )));
                }
                None => {
                    log::warn!("Request to {} without usable API key", req.path());
                    return Ok(req.error_response(AppError::Unauthorized(
                        "API key is missing".to_string(),
                    )));
                }
            };

            req.extensions_mut().insert(PresentedKey(key));
            srv.call(req).await.map(|res| res.map_into_boxed_body())
        })
    }
}
