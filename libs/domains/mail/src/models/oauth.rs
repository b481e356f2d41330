use super::{Credential, CredentialRequest, CredentialUpdate, Provider, ProviderType, SortValue};
use crate::crypto::SecretCodec;
use crate::error::MailResult;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Access tokens this close to expiry are refreshed before use.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Token state persisted after a successful OAuth2 exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expiry: Option<DateTime<Utc>>,
    pub expires_in: Option<i64>,
}

impl TokenBundle {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry
            .is_some_and(|expiry| expiry <= now + Duration::seconds(EXPIRY_SKEW_SECS))
    }
}

/// Gmail API grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gmail {
    pub client_id: String,
    pub secret: String,
    pub user: String,
    pub token: Option<TokenBundle>,
}

/// Microsoft Graph grant for one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Azure {
    pub client_id: String,
    pub tenant_id: String,
    pub secret: String,
    pub user: String,
    pub token: Option<TokenBundle>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateGmail {
    #[validate(length(min = 1, max = 255))]
    pub app: String,
    #[validate(email)]
    pub mail: String,
    #[validate(length(min = 1, max = 255))]
    pub client_id: String,
    #[validate(length(min = 1))]
    pub secret: String,
    #[validate(length(min = 1, max = 255))]
    pub user: String,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGmail {
    #[validate(length(min = 1, max = 255))]
    pub client_id: String,
    #[validate(length(min = 1))]
    pub secret: String,
    #[validate(length(min = 1, max = 255))]
    pub user: String,
    #[serde(default)]
    pub primary: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAzure {
    #[validate(length(min = 1, max = 255))]
    pub app: String,
    #[validate(email)]
    pub mail: String,
    #[validate(length(min = 1, max = 255))]
    pub client_id: String,
    #[validate(length(min = 1, max = 255))]
    pub tenant_id: String,
    #[validate(length(min = 1))]
    pub secret: String,
    #[validate(length(min = 1, max = 255))]
    pub user: String,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAzure {
    #[validate(length(min = 1, max = 255))]
    pub client_id: String,
    #[validate(length(min = 1, max = 255))]
    pub tenant_id: String,
    #[validate(length(min = 1))]
    pub secret: String,
    #[validate(length(min = 1, max = 255))]
    pub user: String,
    #[serde(default)]
    pub primary: bool,
    pub updated_at: DateTime<Utc>,
}

impl CredentialRequest for CreateGmail {
    fn app(&self) -> &str {
        &self.app
    }

    fn mail(&self) -> &str {
        &self.mail
    }

    fn primary(&self) -> bool {
        self.primary
    }
}

impl CredentialRequest for CreateAzure {
    fn app(&self) -> &str {
        &self.app
    }

    fn mail(&self) -> &str {
        &self.mail
    }

    fn primary(&self) -> bool {
        self.primary
    }
}

impl CredentialUpdate for UpdateGmail {
    fn primary(&self) -> bool {
        self.primary
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl CredentialUpdate for UpdateAzure {
    fn primary(&self) -> bool {
        self.primary
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Provider for Gmail {
    const TYPE: ProviderType = ProviderType::Gmail;
    const SORT_COLUMNS: &'static [&'static str] = &[
        "client_id",
        "user",
        "created_at",
        "updated_at",
        "primary_type",
        "app_name",
    ];

    type Create = CreateGmail;
    type Update = UpdateGmail;

    fn from_request(request: CreateGmail, _codec: &SecretCodec) -> MailResult<Self> {
        Ok(Self {
            client_id: request.client_id,
            secret: request.secret,
            user: request.user,
            token: None,
        })
    }

    fn apply_update(&mut self, request: UpdateGmail, _codec: &SecretCodec) -> MailResult<()> {
        self.client_id = request.client_id;
        self.secret = request.secret;
        self.user = request.user;
        Ok(())
    }

    fn sort_value(&self, column: &str) -> SortValue {
        match column {
            "client_id" => SortValue::Text(self.client_id.clone()),
            "user" => SortValue::Text(self.user.clone()),
            _ => SortValue::Null,
        }
    }
}

impl Provider for Azure {
    const TYPE: ProviderType = ProviderType::Azure;
    const SORT_COLUMNS: &'static [&'static str] = &[
        "client_id",
        "tenant_id",
        "user",
        "created_at",
        "updated_at",
        "primary_type",
    ];

    type Create = CreateAzure;
    type Update = UpdateAzure;

    fn from_request(request: CreateAzure, _codec: &SecretCodec) -> MailResult<Self> {
        Ok(Self {
            client_id: request.client_id,
            tenant_id: request.tenant_id,
            secret: request.secret,
            user: request.user,
            token: None,
        })
    }

    fn apply_update(&mut self, request: UpdateAzure, _codec: &SecretCodec) -> MailResult<()> {
        self.client_id = request.client_id;
        self.tenant_id = request.tenant_id;
        self.secret = request.secret;
        self.user = request.user;
        Ok(())
    }

    fn sort_value(&self, column: &str) -> SortValue {
        match column {
            "client_id" => SortValue::Text(self.client_id.clone()),
            "tenant_id" => SortValue::Text(self.tenant_id.clone()),
            "user" => SortValue::Text(self.user.clone()),
            _ => SortValue::Null,
        }
    }
}

/// Gmail or Azure credential as returned by the API. Secrets and tokens are
/// never included; `authorizationUrl` is set on create, update and restore.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OauthCredentialResponse {
    pub id: i64,
    pub app_mail_id: i64,
    pub app: String,
    pub mail: String,
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub user: String,
    pub primary: bool,
    /// Whether the OAuth2 callback has completed
    pub authorized: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
}

impl OauthCredentialResponse {
    pub fn with_authorization_url(mut self, url: String) -> Self {
        self.authorization_url = Some(url);
        self
    }

    fn build<S: Provider>(
        credential: &Credential<S>,
        client_id: String,
        tenant_id: Option<String>,
        user: String,
        authorized: bool,
    ) -> Self {
        Self {
            id: credential.id,
            app_mail_id: credential.app_mail.id,
            app: credential.app_mail.app.clone(),
            mail: credential.app_mail.mail.clone(),
            client_id,
            tenant_id,
            user,
            primary: credential.is_primary(),
            authorized,
            created_at: credential.created_at,
            updated_at: credential.updated_at,
            authorization_url: None,
        }
    }
}

impl From<Credential<Gmail>> for OauthCredentialResponse {
    fn from(credential: Credential<Gmail>) -> Self {
        let authorized = credential.settings.token.is_some();
        let client_id = credential.settings.client_id.clone();
        let user = credential.settings.user.clone();
        Self::build(&credential, client_id, None, user, authorized)
    }
}

impl From<Credential<Azure>> for OauthCredentialResponse {
    fn from(credential: Credential<Azure>) -> Self {
        let authorized = credential.settings.token.is_some();
        let client_id = credential.settings.client_id.clone();
        let tenant_id = Some(credential.settings.tenant_id.clone());
        let user = credential.settings.user.clone();
        Self::build(&credential, client_id, tenant_id, user, authorized)
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OauthCallbackQuery {
    /// Authorization code issued by the provider
    pub code: String,
    /// Credential id passed as `state` in the authorization URL
    pub state: String,
}

/// Credential with its freshly persisted token bundle.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OauthCallbackResponse {
    pub id: i64,
    pub app_mail_id: i64,
    pub client_id: String,
    pub user: String,
    #[serde(flatten)]
    pub token: TokenBundle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OauthCallbackResponse {
    pub fn new<S: Provider>(
        credential: &Credential<S>,
        client_id: &str,
        user: &str,
        token: TokenBundle,
    ) -> Self {
        Self {
            id: credential.id,
            app_mail_id: credential.app_mail.id,
            client_id: client_id.to_string(),
            user: user.to_string(),
            token,
            created_at: credential.created_at,
            updated_at: credential.updated_at,
        }
    }
}
