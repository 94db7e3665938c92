use axum::http::{header, HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};

/// Any origin; downloads expose `Content-Disposition` so browsers can read the filename.
pub fn permissive_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_origin(Any)
        .expose_headers([header::CONTENT_DISPOSITION, HeaderName::from_static("retry-after")])
}
