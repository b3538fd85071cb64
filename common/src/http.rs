use actix_web::{HttpResponse, http::StatusCode};
use serde::Serialize;

use super::error::Res;

pub struct Success;
impl Success {
    pub fn created<T: Serialize>(body: T) -> Res<HttpResponse> {
        Result::Ok(HttpResponse::Created().json(body))
    }
    pub fn ok<T: Serialize>(body: T) -> Res<HttpResponse> {
        Result::Ok(HttpResponse::Ok().json(body))
    }
    /// Responds with a body under a caller-chosen status, for routes that report
    /// a negative outcome (invalid key, nothing revoked) as data rather than an error.
    pub fn with_status<T: Serialize>(status: StatusCode, body: T) -> Res<HttpResponse> {
        Result::Ok(HttpResponse::build(status).json(body))
    }
}
