use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use axum_helpers::ValidatedJson;
use axum_helpers::errors::responses::{BadRequestValidationResponse, InternalServerErrorResponse};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::MailResult;
use crate::models::{AppResponse, CreateApp};
use crate::service::AppService;

#[derive(OpenApi)]
#[openapi(
    paths(create_app),
    components(
        schemas(CreateApp, AppResponse),
        responses(BadRequestValidationResponse, InternalServerErrorResponse)
    ),
    tags((name = "apps", description = "Tenant applications"))
)]
pub struct AppsApiDoc;

pub fn router(service: AppService) -> Router {
    Router::new()
        .route("/", post(create_app))
        .with_state(Arc::new(service))
}

/// Register an app; registering an existing one is a no-op
#[utoipa::path(
    post,
    path = "",
    tag = "apps",
    request_body = CreateApp,
    responses(
        (status = 201, description = "App registered", body = AppResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_app(
    State(service): State<Arc<AppService>>,
    ValidatedJson(input): ValidatedJson<CreateApp>,
) -> MailResult<impl IntoResponse> {
    let app = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(app)))
}
