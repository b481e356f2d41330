use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use axum_helpers::errors::responses::{
    BadRequestValidationResponse, ConflictResponse, InternalServerErrorResponse, NotFoundResponse,
};
use axum_helpers::{IdPath, ValidatedJson};
use std::sync::Arc;
use utoipa::OpenApi;

use super::{update_in_sync, with_authorization_url};
use crate::error::MailResult;
use crate::models::{CreateGmail, Gmail, ListQuery, OauthCredentialResponse, Page, UpdateGmail};
use crate::service::OauthService;

type GmailService = OauthService<Gmail>;

/// OpenAPI documentation for the Gmail credentials API
#[derive(OpenApi)]
#[openapi(
    paths(list_gmails, create_gmail, get_gmail, update_gmail, delete_gmail, restore_gmail),
    components(
        schemas(CreateGmail, UpdateGmail, OauthCredentialResponse, Page<OauthCredentialResponse>),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            ConflictResponse,
            InternalServerErrorResponse
        )
    ),
    tags((name = "gmails", description = "Gmail API credentials"))
)]
pub struct GmailsApiDoc;

pub fn router(service: GmailService) -> Router {
    Router::new()
        .route("/", get(list_gmails).post(create_gmail))
        .route("/{id}", get(get_gmail).put(update_gmail).delete(delete_gmail))
        .route("/{id}/restore", put(restore_gmail))
        .with_state(Arc::new(service))
}

#[utoipa::path(
    get,
    path = "",
    tag = "gmails",
    params(ListQuery),
    responses(
        (status = 200, description = "Page of Gmail credentials", body = Page<OauthCredentialResponse>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_gmails(
    State(service): State<Arc<GmailService>>,
    Query(query): Query<ListQuery>,
) -> MailResult<Json<Page<OauthCredentialResponse>>> {
    let page = service.credentials().list(&query).await?;
    Ok(Json(page.map(OauthCredentialResponse::from)))
}

/// Create a Gmail credential; the response carries the URL that starts the
/// OAuth2 consent
#[utoipa::path(
    post,
    path = "",
    tag = "gmails",
    request_body = CreateGmail,
    responses(
        (status = 201, description = "Gmail credential created", body = OauthCredentialResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_gmail(
    State(service): State<Arc<GmailService>>,
    ValidatedJson(input): ValidatedJson<CreateGmail>,
) -> MailResult<impl IntoResponse> {
    let credential = service.credentials().create(input).await?;
    let response = with_authorization_url(&service, credential)?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "gmails",
    params(("id" = i64, Path, description = "Gmail credential id")),
    responses(
        (status = 200, description = "Gmail credential", body = OauthCredentialResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_gmail(
    State(service): State<Arc<GmailService>>,
    IdPath(id): IdPath,
) -> MailResult<Json<OauthCredentialResponse>> {
    let credential = service.credentials().get(id, false).await?;
    Ok(Json(credential.into()))
}

#[utoipa::path(
    put,
    path = "/{id}",
    tag = "gmails",
    params(("id" = i64, Path, description = "Gmail credential id")),
    request_body = UpdateGmail,
    responses(
        (status = 200, description = "Gmail credential updated", body = OauthCredentialResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_gmail(
    State(service): State<Arc<GmailService>>,
    IdPath(id): IdPath,
    ValidatedJson(input): ValidatedJson<UpdateGmail>,
) -> MailResult<Json<OauthCredentialResponse>> {
    let credential = update_in_sync(service.credentials(), id, input).await?;
    Ok(Json(with_authorization_url(&service, credential)?))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "gmails",
    params(("id" = i64, Path, description = "Gmail credential id")),
    responses(
        (status = 204, description = "Gmail credential deleted"),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_gmail(
    State(service): State<Arc<GmailService>>,
    IdPath(id): IdPath,
) -> MailResult<StatusCode> {
    service.credentials().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/{id}/restore",
    tag = "gmails",
    params(("id" = i64, Path, description = "Gmail credential id")),
    responses(
        (status = 200, description = "Gmail credential restored", body = OauthCredentialResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn restore_gmail(
    State(service): State<Arc<GmailService>>,
    IdPath(id): IdPath,
) -> MailResult<Json<OauthCredentialResponse>> {
    let credential = service.credentials().restore(id).await?;
    Ok(Json(with_authorization_url(&service, credential)?))
}
