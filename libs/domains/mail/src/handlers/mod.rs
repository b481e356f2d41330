//! HTTP surface of the mail service, mounted under `/v1`.

pub mod apps;
pub mod azures;
pub mod gmails;
pub mod oauth;
pub mod send;
pub mod smtps;

use axum::Router;
use chrono::{DateTime, Utc};
use utoipa::OpenApi;

use crate::dispatch::MailDispatcher;
use crate::error::{MailError, MailResult};
use crate::models::{Azure, Credential, CredentialUpdate, Gmail, OauthCredentialResponse, Provider, Smtp};
use crate::oauth::OauthProvider;
use crate::service::{AppService, CredentialService, OauthService};

/// Everything the routers need; cloning only bumps reference counts.
#[derive(Clone)]
pub struct MailState {
    pub apps: AppService,
    pub smtps: CredentialService<Smtp>,
    pub gmails: OauthService<Gmail>,
    pub azures: OauthService<Azure>,
    pub dispatcher: MailDispatcher,
}

/// OpenAPI documentation for the mail API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mailer API",
        version = "0.1.0",
        description = "Per-app mail provider configuration and dispatch"
    ),
    servers(
        (url = "/api/v1", description = "API base path")
    ),
    components(schemas(axum_helpers::ErrorResponse)),
    nest(
        (path = "/apps", api = apps::AppsApiDoc),
        (path = "/mail", api = send::SendApiDoc),
        (path = "/smtps", api = smtps::SmtpsApiDoc),
        (path = "/gmails", api = gmails::GmailsApiDoc),
        (path = "/azures", api = azures::AzuresApiDoc),
        (path = "/oauth2", api = oauth::OauthApiDoc)
    )
)]
pub struct ApiDoc;

/// Create the mail router with all HTTP endpoints
pub fn router(state: MailState) -> Router {
    Router::new()
        .nest("/apps", apps::router(state.apps))
        .nest("/mail", send::router(state.dispatcher))
        .nest("/smtps", smtps::router(state.smtps))
        .nest("/gmails", gmails::router(state.gmails.clone()))
        .nest("/azures", azures::router(state.azures.clone()))
        .nest("/oauth2", oauth::router(state.gmails, state.azures))
}

/// Reject an update whose `updatedAt` is older than the stored row, compared
/// at second precision.
fn ensure_in_sync(stored: DateTime<Utc>, requested: DateTime<Utc>) -> MailResult<()> {
    if requested.timestamp() < stored.timestamp() {
        return Err(MailError::OutOfSync);
    }
    Ok(())
}

/// Load, check `updatedAt`, then overwrite.
async fn update_in_sync<S: Provider>(
    service: &CredentialService<S>,
    id: i64,
    request: S::Update,
) -> MailResult<Credential<S>> {
    let existing = service.get(id, false).await?;
    ensure_in_sync(existing.updated_at, request.updated_at())?;
    service.update(existing, request).await
}

fn with_authorization_url<S>(
    service: &OauthService<S>,
    credential: Credential<S>,
) -> MailResult<OauthCredentialResponse>
where
    S: OauthProvider,
    OauthCredentialResponse: From<Credential<S>>,
{
    let url = service.authorization_url(&credential)?;
    Ok(OauthCredentialResponse::from(credential).with_authorization_url(url))
}
