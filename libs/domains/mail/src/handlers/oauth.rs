use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use axum_helpers::errors::responses::{
    BadGatewayResponse, BadRequestValidationResponse, InternalServerErrorResponse,
    NotFoundResponse,
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::{MailError, MailResult};
use crate::models::{Azure, Gmail, OauthCallbackQuery, OauthCallbackResponse};
use crate::oauth::OauthProvider;
use crate::service::OauthService;

#[derive(OpenApi)]
#[openapi(
    paths(gmail_callback, azure_callback),
    components(
        schemas(OauthCallbackResponse),
        responses(
            BadRequestValidationResponse,
            NotFoundResponse,
            BadGatewayResponse,
            InternalServerErrorResponse
        )
    ),
    tags((name = "oauth2", description = "OAuth2 redirect targets"))
)]
pub struct OauthApiDoc;

pub fn router(gmails: OauthService<Gmail>, azures: OauthService<Azure>) -> Router {
    Router::new()
        .route(
            "/gmails/callback",
            get(gmail_callback).with_state(Arc::new(gmails)),
        )
        .route(
            "/azures/callback",
            get(azure_callback).with_state(Arc::new(azures)),
        )
}

async fn complete<S: OauthProvider>(
    service: &OauthService<S>,
    query: OauthCallbackQuery,
) -> MailResult<OauthCallbackResponse> {
    let credential = service.callback(&query.state, &query.code).await?;
    let token = credential
        .settings
        .token()
        .cloned()
        .ok_or_else(|| MailError::Store(format!("token of {} was not stored", credential.id)))?;

    Ok(OauthCallbackResponse::new(
        &credential,
        credential.settings.client_id(),
        credential.settings.user(),
        token,
    ))
}

/// Exchange the Google authorization code for tokens
#[utoipa::path(
    get,
    path = "/gmails/callback",
    tag = "oauth2",
    params(OauthCallbackQuery),
    responses(
        (status = 200, description = "Token stored", body = OauthCallbackResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 502, response = BadGatewayResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn gmail_callback(
    State(service): State<Arc<OauthService<Gmail>>>,
    Query(query): Query<OauthCallbackQuery>,
) -> MailResult<Json<OauthCallbackResponse>> {
    Ok(Json(complete(&service, query).await?))
}

/// Exchange the Microsoft authorization code for tokens
#[utoipa::path(
    get,
    path = "/azures/callback",
    tag = "oauth2",
    params(OauthCallbackQuery),
    responses(
        (status = 200, description = "Token stored", body = OauthCallbackResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 502, response = BadGatewayResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn azure_callback(
    State(service): State<Arc<OauthService<Azure>>>,
    Query(query): Query<OauthCallbackQuery>,
) -> MailResult<Json<OauthCallbackResponse>> {
    Ok(Json(complete(&service, query).await?))
}
