//! OAuth2 authorization-code flow for the Gmail and Azure providers.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, CsrfToken, ExtraTokenFields,
    RedirectUrl, RefreshToken, Scope, StandardRevocableToken, StandardTokenResponse,
    TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};

use crate::error::{MailError, MailResult};
use crate::models::{Azure, Gmail, Provider, TokenBundle};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GMAIL_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.send",
    "openid",
    "profile",
    "email",
];

const MICROSOFT_LOGIN_URL: &str = "https://login.microsoftonline.com";
const AZURE_SCOPES: &[&str] = &["openid", "offline_access", "user.read", "mail.send"];

/// Everything needed to talk to one provider's authorization server.
#[derive(Clone, PartialEq, Eq)]
pub struct OauthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub scopes: &'static [&'static str],
}

impl std::fmt::Debug for OauthClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OauthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}

/// Credential settings that carry an OAuth2 grant.
pub trait OauthProvider: Provider {
    /// Path segment of the callback route (`gmails`, `azures`)
    const CALLBACK_COLLECTION: &'static str;

    fn client(&self) -> OauthClientConfig;
    fn client_id(&self) -> &str;
    fn user(&self) -> &str;
    fn token(&self) -> Option<&TokenBundle>;
    fn set_token(&mut self, token: TokenBundle);
}

impl OauthProvider for Gmail {
    const CALLBACK_COLLECTION: &'static str = "gmails";

    fn client(&self) -> OauthClientConfig {
        OauthClientConfig {
            client_id: self.client_id.clone(),
            client_secret: self.secret.clone(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            scopes: GMAIL_SCOPES,
        }
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn user(&self) -> &str {
        &self.user
    }

    fn token(&self) -> Option<&TokenBundle> {
        self.token.as_ref()
    }

    fn set_token(&mut self, token: TokenBundle) {
        self.token = Some(token);
    }
}

impl OauthProvider for Azure {
    const CALLBACK_COLLECTION: &'static str = "azures";

    fn client(&self) -> OauthClientConfig {
        let base = format!("{MICROSOFT_LOGIN_URL}/{}/oauth2/v2.0", self.tenant_id);
        OauthClientConfig {
            client_id: self.client_id.clone(),
            client_secret: self.secret.clone(),
            auth_url: format!("{base}/authorize"),
            token_url: format!("{base}/token"),
            scopes: AZURE_SCOPES,
        }
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn user(&self) -> &str {
        &self.user
    }

    fn token(&self) -> Option<&TokenBundle> {
        self.token.as_ref()
    }

    fn set_token(&mut self, token: TokenBundle) {
        self.token = Some(token);
    }
}

/// Consent URL for a credential. The credential id travels as `state` so the
/// callback can find the row again.
pub fn authorization_url(
    client: &OauthClientConfig,
    redirect_url: &str,
    credential_id: i64,
) -> MailResult<String> {
    let auth_url = AuthUrl::new(client.auth_url.clone())
        .map_err(|e| MailError::Validation(format!("Invalid auth URL: {e}")))?;
    let redirect_url = RedirectUrl::new(redirect_url.to_string())
        .map_err(|e| MailError::Validation(format!("Invalid redirect URL: {e}")))?;

    let oauth_client = MailOauthClient::new(ClientId::new(client.client_id.clone()))
        .set_client_secret(ClientSecret::new(client.client_secret.clone()))
        .set_auth_uri(auth_url)
        .set_redirect_uri(redirect_url);

    let state = credential_id.to_string();
    let (url, _) = client
        .scopes
        .iter()
        .fold(
            oauth_client.authorize_url(|| CsrfToken::new(state)),
            |request, scope| request.add_scope(Scope::new(scope.to_string())),
        )
        .add_extra_param("access_type", "offline")
        .url();

    Ok(url.to_string())
}

/// Token endpoint response, reduced to what gets persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: Option<u64>,
    /// Microsoft's extension, used when `expires_in` is missing
    pub ext_expires_in: Option<u64>,
}

/// Fold a fresh grant into the stored token state.
///
/// The previous refresh token survives when the provider does not send a new
/// one, which is the normal case for refresh grants.
pub fn merge_grant(
    previous: Option<&TokenBundle>,
    grant: TokenGrant,
    now: DateTime<Utc>,
) -> TokenBundle {
    let refresh_token = grant
        .refresh_token
        .filter(|token| !token.is_empty())
        .or_else(|| previous.and_then(|token| token.refresh_token.clone()));

    let expires_in = grant
        .expires_in
        .filter(|secs| *secs > 0)
        .or(grant.ext_expires_in)
        .and_then(|secs| i64::try_from(secs).ok());

    TokenBundle {
        access_token: grant.access_token,
        refresh_token,
        token_type: grant.token_type,
        expiry: expires_in.map(|secs| now + Duration::seconds(secs)),
        expires_in,
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange_code(
        &self,
        client: &OauthClientConfig,
        redirect_url: &str,
        code: &str,
    ) -> MailResult<TokenGrant>;

    async fn refresh(
        &self,
        client: &OauthClientConfig,
        refresh_token: &str,
    ) -> MailResult<TokenGrant>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailTokenFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_expires_in: Option<u64>,
}

impl ExtraTokenFields for MailTokenFields {}

type MailTokenResponse = StandardTokenResponse<MailTokenFields, BasicTokenType>;

type MailOauthClient = Client<
    BasicErrorResponse,
    MailTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
>;

/// [`TokenExchanger`] backed by the `oauth2` crate.
#[derive(Clone)]
pub struct Oauth2Exchanger {
    http_client: reqwest::Client,
}

impl Oauth2Exchanger {
    pub fn new() -> MailResult<Self> {
        // Token endpoints are never followed through redirects
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| MailError::OauthExchange(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { http_client })
    }

    fn grant(response: MailTokenResponse) -> TokenGrant {
        let token_type = serde_json::to_value(response.token_type())
            .ok()
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_else(|| "Bearer".to_string());

        TokenGrant {
            access_token: response.access_token().secret().clone(),
            refresh_token: response.refresh_token().map(|t| t.secret().clone()),
            token_type,
            expires_in: response.expires_in().map(|d| d.as_secs()),
            ext_expires_in: response.extra_fields().ext_expires_in,
        }
    }
}

#[async_trait]
impl TokenExchanger for Oauth2Exchanger {
    async fn exchange_code(
        &self,
        client: &OauthClientConfig,
        redirect_url: &str,
        code: &str,
    ) -> MailResult<TokenGrant> {
        let oauth_client = MailOauthClient::new(ClientId::new(client.client_id.clone()))
            .set_client_secret(ClientSecret::new(client.client_secret.clone()))
            .set_token_uri(TokenUrl::new(client.token_url.clone()).map_err(|e| {
                MailError::OauthExchange(format!("Invalid token URL: {e}"))
            })?)
            .set_redirect_uri(RedirectUrl::new(redirect_url.to_string()).map_err(|e| {
                MailError::OauthExchange(format!("Invalid redirect URL: {e}"))
            })?);

        let response = oauth_client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| MailError::OauthExchange(format!("Failed to exchange code: {e}")))?;

        Ok(Self::grant(response))
    }

    async fn refresh(
        &self,
        client: &OauthClientConfig,
        refresh_token: &str,
    ) -> MailResult<TokenGrant> {
        let oauth_client = MailOauthClient::new(ClientId::new(client.client_id.clone()))
            .set_client_secret(ClientSecret::new(client.client_secret.clone()))
            .set_token_uri(TokenUrl::new(client.token_url.clone()).map_err(|e| {
                MailError::OauthExchange(format!("Invalid token URL: {e}"))
            })?);

        let refresh_token = RefreshToken::new(refresh_token.to_string());
        let response = oauth_client
            .exchange_refresh_token(&refresh_token)
            .request_async(&self.http_client)
            .await
            .map_err(|e| MailError::OauthExchange(format!("Failed to refresh token: {e}")))?;

        Ok(Self::grant(response))
    }
}
