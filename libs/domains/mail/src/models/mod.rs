//! Domain types shared by the stores, services and handlers.

mod app;
mod list;
mod oauth;
mod send;
mod smtp;

pub use app::{AppResponse, CreateApp};
pub use list::{ListFilter, ListQuery, MAX_LIMIT, Sort, SortColumn, SortValue};
pub use oauth::{
    Azure, CreateAzure, CreateGmail, Gmail, OauthCallbackQuery, OauthCallbackResponse,
    OauthCredentialResponse, TokenBundle, UpdateAzure, UpdateGmail,
};
pub use send::{Attachment, AttachmentRequest, NewSendRecord, SendMailRequest};
pub use smtp::{CreateSmtp, Smtp, SmtpResponse, UpdateSmtp};

use crate::crypto::SecretCodec;
use crate::error::MailResult;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};
use utoipa::ToSchema;
use validator::Validate;

/// Mechanism used to transmit mail for an app and mail pairing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum ProviderType {
    #[serde(rename = "SMTP")]
    #[strum(serialize = "SMTP")]
    Smtp,
    Gmail,
    Azure,
}

impl ProviderType {
    /// Order in which providers are probed when neither an explicit type nor
    /// a primary type decides.
    pub const PROBE_ORDER: [ProviderType; 3] = [Self::Azure, Self::Gmail, Self::Smtp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Smtp => "SMTP",
            Self::Gmail => "Gmail",
            Self::Azure => "Azure",
        }
    }

    /// Cache key of a credential of this provider.
    pub fn cache_key(&self, id: i64) -> String {
        format!("{}:{}", self.as_str(), id)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum DkimCanonicalization {
    Simple,
    Relaxed,
}

/// Join row for an (app, mail) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppMail {
    pub id: i64,
    pub app: String,
    pub mail: String,
    pub primary_type: Option<ProviderType>,
}

/// A stored provider credential together with the snapshot of its pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential<S> {
    pub id: i64,
    pub app_mail: AppMail,
    pub settings: S,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl<S: Provider> Credential<S> {
    /// Unsaved credential; the store assigns `id` and timestamps.
    pub fn new(app_mail: AppMail, settings: S) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            app_mail,
            settings,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.app_mail.primary_type == Some(S::TYPE)
    }

    pub fn cache_key(&self) -> String {
        S::TYPE.cache_key(self.id)
    }
}

/// Provider-specific part of a credential.
///
/// Ties the stored settings to the requests that create and update them so
/// the store, cache and service logic can be written once.
pub trait Provider:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const TYPE: ProviderType;

    type Create: CredentialRequest;
    type Update: CredentialUpdate;

    fn from_request(request: Self::Create, codec: &SecretCodec) -> MailResult<Self>;

    /// Overwrite every field the request carries.
    fn apply_update(&mut self, request: Self::Update, codec: &SecretCodec) -> MailResult<()>;

    /// Columns a list of this provider may be sorted by. Pairing columns
    /// use their `app_mails` names.
    const SORT_COLUMNS: &'static [&'static str];

    /// Value of one of this provider's own columns in [`Self::SORT_COLUMNS`].
    fn sort_value(&self, column: &str) -> SortValue;
}

pub trait CredentialRequest: Validate + Send + Sync + 'static {
    fn app(&self) -> &str;
    fn mail(&self) -> &str;
    fn primary(&self) -> bool;
}

pub trait CredentialUpdate: Validate + Send + Sync + 'static {
    fn primary(&self) -> bool;
    /// Last `updatedAt` the client saw
    fn updated_at(&self) -> DateTime<Utc>;
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub page_count: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u64, limit: u64, total: u64) -> Self {
        Self {
            items,
            page,
            limit,
            total,
            page_count: total.div_ceil(limit),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total: self.total,
            page_count: self.page_count,
        }
    }
}
