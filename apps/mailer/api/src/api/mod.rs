mod health;

use axum::Router;
use domain_mail::{
    AppService, Azure, CredentialService, Gmail, MailDispatcher, MailResult, MailState,
    Oauth2Exchanger, OauthService, PgAppMailRepository, PgAzureRepository, PgGmailRepository,
    PgSendRecordRepository, PgSmtpRepository, ProviderTransports, RedisCache, SecretCodec, Smtp,
};
use std::sync::Arc;

use crate::state::AppState;

/// Wire the mail domain onto the shared connections.
///
/// The `/api` prefix is added by `create_router`, so everything lands under
/// `/api/v1`.
pub fn routes(state: &AppState) -> MailResult<Router> {
    let mail = &state.config.mail;
    let links = Arc::new(PgAppMailRepository::new(state.db.clone()));
    let cache = Arc::new(RedisCache::new(state.redis.clone()));
    let codec = Arc::new(SecretCodec::new(&mail.password_encryption_key)?);
    let exchanger = Arc::new(Oauth2Exchanger::new()?);

    let smtps = CredentialService::<Smtp>::new(
        links.clone(),
        Arc::new(PgSmtpRepository::new(state.db.clone())),
        cache.clone(),
        codec.clone(),
        mail.cache_expiration,
    );
    let gmails = OauthService::<Gmail>::new(
        CredentialService::<Gmail>::new(
            links.clone(),
            Arc::new(PgGmailRepository::new(state.db.clone())),
            cache.clone(),
            codec.clone(),
            mail.cache_expiration,
        ),
        exchanger.clone(),
        mail,
    );
    let azures = OauthService::<Azure>::new(
        CredentialService::<Azure>::new(
            links.clone(),
            Arc::new(PgAzureRepository::new(state.db.clone())),
            cache,
            codec,
            mail.cache_expiration,
        ),
        exchanger,
        mail,
    );

    let dispatcher = MailDispatcher::new(
        links.clone(),
        Arc::new(PgSendRecordRepository::new(state.db.clone())),
        Arc::new(ProviderTransports::new()?),
        smtps.clone(),
        gmails.clone(),
        azures.clone(),
    );

    let mail_state = MailState {
        apps: AppService::new(links),
        smtps,
        gmails,
        azures,
        dispatcher,
    };

    Ok(Router::new().nest("/v1", domain_mail::handlers::router(mail_state)))
}

/// `/ready` with real database and cache checks; merged next to the
/// stateless router from `create_router`.
pub fn ready_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/ready", get(health::ready_handler))
        .with_state(state)
}
