use std::sync::{Mutex, MutexGuard, OnceLock};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
};

/// Serializes tests that mutate process environment variables.
pub(crate) fn env_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(())).lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn set_test_env() {
    dotenvy::dotenv().ok();

    std::env::set_var("EXAMROOM_ENV", "test");
    std::env::set_var("EXAMROOM_STRICT_CONFIG", "0");
    std::env::set_var("SECRET_KEY", "test-secret");
    std::env::set_var("PROJECT_NAME", "Examroom API");
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
