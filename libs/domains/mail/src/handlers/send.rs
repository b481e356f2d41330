use axum::{Router, extract::State, http::StatusCode, routing::post};
use axum_helpers::ValidatedJson;
use axum_helpers::errors::responses::{
    BadGatewayResponse, BadRequestValidationResponse, InternalServerErrorResponse,
    NotFoundResponse, UnprocessableEntityResponse,
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::dispatch::MailDispatcher;
use crate::error::MailResult;
use crate::models::{AttachmentRequest, SendMailRequest};

#[derive(OpenApi)]
#[openapi(
    paths(send_mail),
    components(
        schemas(SendMailRequest, AttachmentRequest),
        responses(
            BadRequestValidationResponse,
            NotFoundResponse,
            UnprocessableEntityResponse,
            BadGatewayResponse,
            InternalServerErrorResponse
        )
    ),
    tags((name = "mail", description = "Mail dispatch"))
)]
pub struct SendApiDoc;

pub fn router(dispatcher: MailDispatcher) -> Router {
    Router::new()
        .route("/send", post(send_mail))
        .with_state(Arc::new(dispatcher))
}

/// Send a mail through the provider configured for the app and mail
#[utoipa::path(
    post,
    path = "/send",
    tag = "mail",
    request_body = SendMailRequest,
    responses(
        (status = 201, description = "Mail handed to the provider"),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 422, response = UnprocessableEntityResponse),
        (status = 502, response = BadGatewayResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn send_mail(
    State(dispatcher): State<Arc<MailDispatcher>>,
    ValidatedJson(input): ValidatedJson<SendMailRequest>,
) -> MailResult<StatusCode> {
    dispatcher.send(input).await?;
    Ok(StatusCode::CREATED)
}
