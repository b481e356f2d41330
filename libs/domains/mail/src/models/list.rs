use super::{Credential, Provider, ProviderType};
use crate::error::{MailError, MailResult};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::cmp::Ordering;
use std::str::FromStr;
use utoipa::IntoParams;

const DEFAULT_PAGE: u64 = 1;
const DEFAULT_LIMIT: u64 = 10;
/// Largest page size a caller can ask for.
pub const MAX_LIMIT: u64 = 100;

/// Query parameters of the list endpoints.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// 1-based page, defaults to 1
    pub page: Option<i64>,
    /// Page size, defaults to 10 and is capped at 100
    pub limit: Option<i64>,
    /// Only credentials of this app
    pub app: Option<String>,
    /// Only credentials of this mail address
    pub mail: Option<String>,
    /// Only credentials whose pairing has this primary type
    pub primary_type: Option<String>,
    /// Sort column, `-` prefix for descending. Defaults to `-created_at`.
    pub sort: Option<String>,
}

impl ListQuery {
    /// Page and limit with values below 1 reset to their defaults and the
    /// limit capped at [`MAX_LIMIT`].
    pub fn normalized(&self) -> (u64, u64) {
        let page = self
            .page
            .filter(|p| *p >= 1)
            .map_or(DEFAULT_PAGE, |p| p as u64);
        let limit = self
            .limit
            .filter(|l| *l >= 1)
            .map_or(DEFAULT_LIMIT, |l| (l as u64).min(MAX_LIMIT));
        (page, limit)
    }

    /// Check the query against the sortable columns of `S`.
    pub fn to_filter<S: Provider>(&self) -> MailResult<ListFilter> {
        let (page, limit) = self.normalized();
        let offset = (page - 1).checked_mul(limit).ok_or_else(|| {
            MailError::Validation(format!("page {page} is out of range"))
        })?;

        let primary_type = self
            .primary_type
            .as_deref()
            .map(|name| {
                ProviderType::from_str(name)
                    .map_err(|_| MailError::Validation(format!("unknown primaryType {name}")))
            })
            .transpose()?;

        let sort = match self.sort.as_deref().map(str::trim) {
            None | Some("") => Sort::default(),
            Some(raw) => Sort::parse::<S>(raw)?,
        };

        Ok(ListFilter {
            app: self.app.clone().filter(|a| !a.is_empty()),
            mail: self.mail.clone().filter(|m| !m.is_empty()),
            primary_type,
            sort,
            page,
            limit,
            offset,
        })
    }
}

/// A validated list request, ready for a store.
#[derive(Debug, Clone, PartialEq)]
pub struct ListFilter {
    pub app: Option<String>,
    pub mail: Option<String>,
    pub primary_type: Option<ProviderType>,
    pub sort: Sort,
    pub page: u64,
    pub limit: u64,
    pub offset: u64,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            app: None,
            mail: None,
            primary_type: None,
            sort: Sort::default(),
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl ListFilter {
    /// Whether the credential passes the app, mail and primary filters.
    pub fn matches<S: Provider>(&self, credential: &Credential<S>) -> bool {
        let link = &credential.app_mail;
        self.app.as_ref().is_none_or(|app| *app == link.app)
            && self.mail.as_ref().is_none_or(|mail| *mail == link.mail)
            && self
                .primary_type
                .is_none_or(|primary| link.primary_type == Some(primary))
    }

    /// Ordering of two credentials, with the id as tiebreak in the same
    /// direction.
    pub fn compare<S: Provider>(&self, a: &Credential<S>, b: &Credential<S>) -> Ordering {
        let ordering = a
            .sort_value(self.sort.column)
            .cmp(&b.sort_value(self.sort.column))
            .then(a.id.cmp(&b.id));
        if self.sort.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

/// Column a list is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Id,
    CreatedAt,
    UpdatedAt,
    AppName,
    MailName,
    PrimaryType,
    /// Provider column, one of [`Provider::SORT_COLUMNS`]
    Setting(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub column: SortColumn,
    pub descending: bool,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            column: SortColumn::CreatedAt,
            descending: true,
        }
    }
}

impl Sort {
    /// Parse `column` or `-column`. Pairing columns may carry the
    /// `app_mails.` table prefix.
    pub fn parse<S: Provider>(raw: &str) -> MailResult<Self> {
        let (descending, name) = match raw.strip_prefix('-') {
            Some(name) => (true, name),
            None => (false, raw),
        };
        let bare = name.strip_prefix("app_mails.").unwrap_or(name);

        let allowed = S::SORT_COLUMNS
            .iter()
            .copied()
            .find(|column| *column == bare)
            .ok_or_else(|| {
                MailError::Validation(format!(
                    "cannot sort {} by {name}, expected one of {}",
                    S::TYPE,
                    S::SORT_COLUMNS.join(", ")
                ))
            })?;

        let column = match allowed {
            "id" => SortColumn::Id,
            "created_at" => SortColumn::CreatedAt,
            "updated_at" => SortColumn::UpdatedAt,
            "app_name" => SortColumn::AppName,
            "mail_name" => SortColumn::MailName,
            "primary_type" => SortColumn::PrimaryType,
            other => SortColumn::Setting(other),
        };
        Ok(Self { column, descending })
    }
}

/// Comparable value of one sort column. `Null` orders after every value,
/// as Postgres does for ascending sorts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortValue {
    Int(i64),
    Time(DateTime<Utc>),
    Text(String),
    Null,
}

impl<S: Provider> Credential<S> {
    pub fn sort_value(&self, column: SortColumn) -> SortValue {
        match column {
            SortColumn::Id => SortValue::Int(self.id),
            SortColumn::CreatedAt => SortValue::Time(self.created_at),
            SortColumn::UpdatedAt => SortValue::Time(self.updated_at),
            SortColumn::AppName => SortValue::Text(self.app_mail.app.clone()),
            SortColumn::MailName => SortValue::Text(self.app_mail.mail.clone()),
            SortColumn::PrimaryType => self
                .app_mail
                .primary_type
                .map_or(SortValue::Null, |t| SortValue::Text(t.as_str().to_string())),
            SortColumn::Setting(name) => self.settings.sort_value(name),
        }
    }
}
