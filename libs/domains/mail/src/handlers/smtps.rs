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

use super::update_in_sync;
use crate::error::MailResult;
use crate::models::{CreateSmtp, ListQuery, Page, Smtp, SmtpResponse, UpdateSmtp};
use crate::service::CredentialService;

type SmtpService = CredentialService<Smtp>;

/// OpenAPI documentation for the SMTP credentials API
#[derive(OpenApi)]
#[openapi(
    paths(list_smtps, create_smtp, get_smtp, update_smtp, delete_smtp, restore_smtp),
    components(
        schemas(CreateSmtp, UpdateSmtp, SmtpResponse, Page<SmtpResponse>),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            ConflictResponse,
            InternalServerErrorResponse
        )
    ),
    tags((name = "smtps", description = "SMTP credentials"))
)]
pub struct SmtpsApiDoc;

pub fn router(service: SmtpService) -> Router {
    Router::new()
        .route("/", get(list_smtps).post(create_smtp))
        .route("/{id}", get(get_smtp).put(update_smtp).delete(delete_smtp))
        .route("/{id}/restore", put(restore_smtp))
        .with_state(Arc::new(service))
}

/// List live SMTP credentials, newest first
#[utoipa::path(
    get,
    path = "",
    tag = "smtps",
    params(ListQuery),
    responses(
        (status = 200, description = "Page of SMTP credentials", body = Page<SmtpResponse>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_smtps(
    State(service): State<Arc<SmtpService>>,
    Query(query): Query<ListQuery>,
) -> MailResult<Json<Page<SmtpResponse>>> {
    let page = service.list(&query).await?;
    Ok(Json(page.map(SmtpResponse::from)))
}

/// Create an SMTP credential; the password is stored encrypted
#[utoipa::path(
    post,
    path = "",
    tag = "smtps",
    request_body = CreateSmtp,
    responses(
        (status = 201, description = "SMTP credential created", body = SmtpResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_smtp(
    State(service): State<Arc<SmtpService>>,
    ValidatedJson(input): ValidatedJson<CreateSmtp>,
) -> MailResult<impl IntoResponse> {
    let credential = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(SmtpResponse::from(credential))))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "smtps",
    params(("id" = i64, Path, description = "SMTP credential id")),
    responses(
        (status = 200, description = "SMTP credential", body = SmtpResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_smtp(
    State(service): State<Arc<SmtpService>>,
    IdPath(id): IdPath,
) -> MailResult<Json<SmtpResponse>> {
    let credential = service.get(id, false).await?;
    Ok(Json(credential.into()))
}

/// Overwrite an SMTP credential; an empty password keeps the stored one
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "smtps",
    params(("id" = i64, Path, description = "SMTP credential id")),
    request_body = UpdateSmtp,
    responses(
        (status = 200, description = "SMTP credential updated", body = SmtpResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_smtp(
    State(service): State<Arc<SmtpService>>,
    IdPath(id): IdPath,
    ValidatedJson(input): ValidatedJson<UpdateSmtp>,
) -> MailResult<Json<SmtpResponse>> {
    let credential = update_in_sync(&service, id, input).await?;
    Ok(Json(credential.into()))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "smtps",
    params(("id" = i64, Path, description = "SMTP credential id")),
    responses(
        (status = 204, description = "SMTP credential deleted"),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_smtp(
    State(service): State<Arc<SmtpService>>,
    IdPath(id): IdPath,
) -> MailResult<StatusCode> {
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Undo a soft delete
#[utoipa::path(
    put,
    path = "/{id}/restore",
    tag = "smtps",
    params(("id" = i64, Path, description = "SMTP credential id")),
    responses(
        (status = 200, description = "SMTP credential restored", body = SmtpResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn restore_smtp(
    State(service): State<Arc<SmtpService>>,
    IdPath(id): IdPath,
) -> MailResult<Json<SmtpResponse>> {
    let credential = service.restore(id).await?;
    Ok(Json(credential.into()))
}
