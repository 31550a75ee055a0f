//! Shared domain types, error kinds, API interfaces, and configuration for
//! threadnote.

pub mod accounts;
pub mod api;
pub mod app_config;
pub mod clock;
pub mod config;
pub mod credential;
pub mod error;
pub mod field_mapping;
pub mod notify;
pub mod types;

pub use accounts::{load_accounts, parse_accounts, Account, AccountsFile};
pub use api::{
    AccountMetrics, DestinationApi, DestinationPage, Identity, ListQuery, PageFilter, PageQuery,
    PageSort, SourceApi, TimeRange, TokenGrant,
};
pub use app_config::AppConfig;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_app_config, load_app_config_from_env};
pub use credential::SharedCredential;
pub use error::{ConfigError, ErrorKind, SyncError};
pub use field_mapping::{
    CollectionSchema, FieldMapping, FieldType, Properties, PropertyValue, Role, SchemaField,
};
pub use notify::{LogNotifier, Notifier};
pub use types::{
    ContentItem, ItemError, Mapping, MediaType, MetricKind, Metrics, Page, SyncResult,
};
