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
use crate::models::{Azure, CreateAzure, ListQuery, OauthCredentialResponse, Page, UpdateAzure};
use crate::service::OauthService;

type AzureService = OauthService<Azure>;

/// OpenAPI documentation for the Azure credentials API
#[derive(OpenApi)]
#[openapi(
    paths(list_azures, create_azure, get_azure, update_azure, delete_azure, restore_azure),
    components(
        schemas(CreateAzure, UpdateAzure, OauthCredentialResponse, Page<OauthCredentialResponse>),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            ConflictResponse,
            InternalServerErrorResponse
        )
    ),
    tags((name = "azures", description = "Microsoft Graph credentials"))
)]
pub struct AzuresApiDoc;

pub fn router(service: AzureService) -> Router {
    Router::new()
        .route("/", get(list_azures).post(create_azure))
        .route("/{id}", get(get_azure).put(update_azure).delete(delete_azure))
        .route("/{id}/restore", put(restore_azure))
        .with_state(Arc::new(service))
}

#[utoipa::path(
    get,
    path = "",
    tag = "azures",
    params(ListQuery),
    responses(
        (status = 200, description = "Page of Azure credentials", body = Page<OauthCredentialResponse>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_azures(
    State(service): State<Arc<AzureService>>,
    Query(query): Query<ListQuery>,
) -> MailResult<Json<Page<OauthCredentialResponse>>> {
    let page = service.credentials().list(&query).await?;
    Ok(Json(page.map(OauthCredentialResponse::from)))
}

/// Create an Azure credential; the response carries the URL that starts the
/// OAuth2 consent
#[utoipa::path(
    post,
    path = "",
    tag = "azures",
    request_body = CreateAzure,
    responses(
        (status = 201, description = "Azure credential created", body = OauthCredentialResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_azure(
    State(service): State<Arc<AzureService>>,
    ValidatedJson(input): ValidatedJson<CreateAzure>,
) -> MailResult<impl IntoResponse> {
    let credential = service.credentials().create(input).await?;
    let response = with_authorization_url(&service, credential)?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "azures",
    params(("id" = i64, Path, description = "Azure credential id")),
    responses(
        (status = 200, description = "Azure credential", body = OauthCredentialResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_azure(
    State(service): State<Arc<AzureService>>,
    IdPath(id): IdPath,
) -> MailResult<Json<OauthCredentialResponse>> {
    let credential = service.credentials().get(id, false).await?;
    Ok(Json(credential.into()))
}

#[utoipa::path(
    put,
    path = "/{id}",
    tag = "azures",
    params(("id" = i64, Path, description = "Azure credential id")),
    request_body = UpdateAzure,
    responses(
        (status = 200, description = "Azure credential updated", body = OauthCredentialResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_azure(
    State(service): State<Arc<AzureService>>,
    IdPath(id): IdPath,
    ValidatedJson(input): ValidatedJson<UpdateAzure>,
) -> MailResult<Json<OauthCredentialResponse>> {
    let credential = update_in_sync(service.credentials(), id, input).await?;
    Ok(Json(with_authorization_url(&service, credential)?))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "azures",
    params(("id" = i64, Path, description = "Azure credential id")),
    responses(
        (status = 204, description = "Azure credential deleted"),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_azure(
    State(service): State<Arc<AzureService>>,
    IdPath(id): IdPath,
) -> MailResult<StatusCode> {
    service.credentials().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/{id}/restore",
    tag = "azures",
    params(("id" = i64, Path, description = "Azure credential id")),
    responses(
        (status = 200, description = "Azure credential restored", body = OauthCredentialResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn restore_azure(
    State(service): State<Arc<AzureService>>,
    IdPath(id): IdPath,
) -> MailResult<Json<OauthCredentialResponse>> {
    let credential = service.credentials().restore(id).await?;
    Ok(Json(with_authorization_url(&service, credential)?))
}
