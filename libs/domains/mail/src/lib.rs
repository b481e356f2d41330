//! Mail Domain
//!
//! Per-app mail provider configuration (SMTP, Gmail API, Microsoft Graph)
//! and dispatch of outgoing mail through the provider each app and mail
//! pairing resolves to.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints under /v1
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐     ┌────────────┐
//! │  Services   │ ──► │ Dispatcher │ ──► Transports (lettre, Gmail, Graph)
//! └──────┬──────┘     └────────────┘
//!        │
//! ┌──────▼──────┐     ┌────────────┐
//! │ Repositories│     │   Cache    │  ← Redis, best-effort
//! └──────┬──────┘     └────────────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Credentials, requests, responses
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_mail::{
//!     CredentialService, InMemoryAppMailRepository, InMemoryCache,
//!     InMemoryCredentialRepository, SecretCodec, Smtp,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let links = InMemoryAppMailRepository::new();
//! let smtps = CredentialService::<Smtp>::new(
//!     Arc::new(links.clone()),
//!     Arc::new(InMemoryCredentialRepository::<Smtp>::new(links)),
//!     Arc::new(InMemoryCache::new()),
//!     Arc::new(SecretCodec::new("0123456789abcdef0123456789abcdef").unwrap()),
//!     Duration::from_secs(3600),
//! );
//! ```

pub mod cache;
pub mod crypto;
pub mod dispatch;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod oauth;
pub mod postgres;
pub mod repository;
pub mod service;
pub mod transport;

pub use cache::{CredentialCache, InMemoryCache, RedisCache};
pub use crypto::SecretCodec;
pub use dispatch::MailDispatcher;
pub use error::{MailError, MailResult};
pub use handlers::{ApiDoc, MailState};
pub use models::{
    AppMail, Azure, Credential, Gmail, ProviderType, SendMailRequest, Smtp, TokenBundle,
};
pub use oauth::{Oauth2Exchanger, TokenExchanger};
pub use postgres::{
    PgAppMailRepository, PgAzureRepository, PgGmailRepository, PgSendRecordRepository,
    PgSmtpRepository,
};
pub use repository::{
    AppMailRepository, CredentialRepository, InMemoryAppMailRepository,
    InMemoryCredentialRepository, InMemorySendRecordRepository, SendRecordRepository,
};
pub use service::{AppService, CredentialService, OauthService};
pub use transport::{MailTransport, OutgoingMail, ProviderTransports, ResolvedCredential};
