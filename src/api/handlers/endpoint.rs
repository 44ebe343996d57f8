//! HTTP adapter around [`AuthHandler`].

use super::auth::{ActionRequest, AuthHandler, AuthRequest, AuthResponse, AuthSuccess, ErrorBody};
use axum::{
    body::{Body, Bytes},
    extract::Extension,
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

impl IntoResponse for AuthResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[utoipa::path(
    post,
    path = "/",
    request_body = ActionRequest,
    responses(
        (status = 200, description = "Action succeeded", body = AuthSuccess, content_type = "application/json"),
        (status = 400, description = "Missing fields, duplicate user or unknown action", body = ErrorBody),
        (status = 401, description = "Invalid credentials or session", body = ErrorBody),
        (status = 405, description = "Method not allowed", body = ErrorBody),
        (status = 503, description = "Credential store unavailable", body = ErrorBody),
        (status = 504, description = "Credential store timed out", body = ErrorBody),
    ),
    tag = "auth"
)]
// Every method is routed here; the handler answers preflight and rejects the rest.
// Raw bytes so that a non UTF-8 body still gets the JSON envelope and the method check.
pub async fn endpoint(
    handler: Extension<Arc<AuthHandler>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let body = match String::from_utf8(body.to_vec()) {
        Ok(body) => body,
        // Unparseable as JSON, reported as an invalid body
        Err(_) => "\u{fffd}".to_string(),
    };

    handler
        .handle(AuthRequest {
            method,
            headers,
            body: Some(body),
        })
        .await
}
