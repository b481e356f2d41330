//! Sea-ORM entities for the tables created by the `migration` crate.

pub mod app;
pub mod app_mail;
pub mod azure;
pub mod gmail;
pub mod mail;
pub mod send_mail;
pub mod send_mail_attachment;
pub mod smtp;

use crate::models::TokenBundle;
use chrono::{DateTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;

/// Token columns shared by `gmails` and `azures`.
pub(crate) struct TokenColumns {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub expiry: Option<DateTimeWithTimeZone>,
    pub expires_in: Option<i64>,
}

impl TokenColumns {
    /// A bundle exists once an access token has been stored.
    pub fn into_bundle(self) -> Option<TokenBundle> {
        let access_token = self.access_token?;
        Some(TokenBundle {
            access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_default(),
            expiry: self.expiry.map(Into::into),
            expires_in: self.expires_in,
        })
    }

    pub fn from_bundle(token: Option<&TokenBundle>) -> Self {
        match token {
            Some(token) => Self {
                access_token: Some(token.access_token.clone()),
                refresh_token: token.refresh_token.clone(),
                token_type: Some(token.token_type.clone()),
                expiry: token.expiry.map(Into::into),
                expires_in: token.expires_in,
            },
            None => Self {
                access_token: None,
                refresh_token: None,
                token_type: None,
                expiry: None,
                expires_in: None,
            },
        }
    }
}

pub(crate) fn to_utc(value: DateTimeWithTimeZone) -> DateTime<Utc> {
    value.into()
}
