// Durable per-account configuration store

pub mod postgres;

pub use postgres::PgConfigStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::StoreError;
use crate::models::AccountConfig;

/// Contract the scheduler and protocol paths need from persistence.
///
/// The store owns row-level atomicity; callers never hold a transaction
/// open across a network call. Account provisioning happens outside this
/// interface, so writes against a missing account simply touch no row.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// The account's config, or `None` when it was never provisioned.
    async fn get_by_owner(&self, owner_id: i64) -> Result<Option<AccountConfig>, StoreError>;

    /// Every account currently flagged active, for the sweep.
    async fn get_all_active(&self) -> Result<Vec<AccountConfig>, StoreError>;

    /// Persists a rotated session credential.
    async fn upsert_credential(&self, owner_id: i64, credential: &str) -> Result<(), StoreError>;

    /// Records the outcome of a keep-alive exchange.
    async fn record_keep_alive(
        &self,
        owner_id: i64,
        success: bool,
        message: &str,
    ) -> Result<(), StoreError>;

    /// Records the outcome of a check-in attempt.
    async fn record_checkin(
        &self,
        owner_id: i64,
        success: bool,
        message: &str,
    ) -> Result<(), StoreError>;

    /// Sets or clears the auto check-in expiry.
    async fn set_auto_checkin_expiry(
        &self,
        owner_id: i64,
        expire_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;
}
