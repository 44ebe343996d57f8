use crate::api::handlers::{
    auth::{ActionRequest, AuthSuccess, ErrorBody},
    endpoint, health,
};
use crate::store::User;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(endpoint::endpoint, health::health),
    components(schemas(ActionRequest, AuthSuccess, ErrorBody, User, health::Health)),
    tags(
        (name = "auth", description = "Registration, login and session verification"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
