use actix_web::web;
use middleware::key::KeyMiddleware;

pub mod routes {
    pub mod key;
}
pub mod middleware {
    pub mod key;
}
pub mod models {
    pub mod key;
}
pub mod service {
    pub mod expiration;
    pub mod generator;
    pub mod key;
}
pub mod store {
    pub mod backend;
    pub mod document;
    pub mod memory;
}

mod dtos {
    pub(crate) mod key;
}

#[cfg(test)]
mod testing;

pub use service::key::KeyManager;

/// Key management routes. Everything except `/validate` requires a bearer JWT.
pub fn mount_keys() -> actix_web::Scope {
    web::scope("/keys")
        .service(routes::key::post_validate)
        .service(routes::key::post_revoke)
        .service(routes::key::post_create_key)
        .service(routes::key::get_keys)
}

/// Routes meant to sit behind the API key request gate, see [`middleware`].
pub fn mount_gated() -> actix_web::Scope {
    web::scope("/v1").service(routes::key::get_presented_key)
}

pub fn middleware(max_key_length: usize) -> KeyMiddleware {
    KeyMiddleware::new(max_key_length)
}
