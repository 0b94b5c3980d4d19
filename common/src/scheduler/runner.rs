// Job bodies executed by the scheduler's timers and by manual triggers

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::RemoteConfig;
use crate::errors::ProtocolError;
use crate::models::{AccountConfig, CheckinOutcome, RefreshOutcome};
use crate::protocol::ProtocolClient;
use crate::store::ConfigStore;
use crate::telemetry;

/// Executes keep-alive and check-in work for accounts.
///
/// Bodies are reentrant: a timer firing and a manual trigger may run the
/// same account concurrently, each with its own client, and the store
/// absorbs the overlapping writes. No body ever propagates an error to
/// the timer that invoked it.
pub struct JobRunner {
    store: Arc<dyn ConfigStore>,
    remote: RemoteConfig,
}

impl JobRunner {
    pub fn new(store: Arc<dyn ConfigStore>, remote: RemoteConfig) -> Self {
        Self { store, remote }
    }

    /// One keep-alive pass over every active account. Accounts are
    /// isolated: one failing exchange never stops the rest of the pass.
    #[instrument(skip(self), fields(sweep_id = %Uuid::new_v4()))]
    pub async fn sweep_once(&self) {
        let started = Instant::now();

        let configs = match self.store.get_all_active().await {
            Ok(configs) => configs,
            Err(e) => {
                error!(error = %e, "Keep-alive sweep could not load active accounts");
                return;
            }
        };

        if configs.is_empty() {
            debug!("No active accounts to keep alive");
            return;
        }

        info!(count = configs.len(), "Running keep-alive sweep");

        for config in &configs {
            // An account that never received a credential is skipped
            // without recording anything
            if config.has_empty_credential() {
                debug!(owner_id = config.owner_id, "Skipping account with empty credential");
                continue;
            }
            self.keep_alive_account(config).await;
        }

        telemetry::record_sweep_duration(started.elapsed().as_secs_f64());
    }

    /// Refreshes one account's session, persisting any credential the
    /// server rotated along the way, then records the outcome.
    #[instrument(skip(self, config), fields(owner_id = config.owner_id))]
    pub async fn keep_alive_account(&self, config: &AccountConfig) -> RefreshOutcome {
        let mut client = match self.client_for(config) {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "Keep-alive could not build a protocol client");
                return RefreshOutcome::failure(e.to_string(), None);
            }
        };

        let outcome = client.refresh_session().await;

        if let Some(rotated) = &outcome.rotated_credential {
            match self
                .store
                .upsert_credential(config.owner_id, &rotated.to_string())
                .await
            {
                Ok(()) => info!("Session credential updated"),
                Err(e) => error!(error = %e, "Failed to persist rotated credential"),
            }
        }

        if let Err(e) = self
            .store
            .record_keep_alive(config.owner_id, outcome.success, &outcome.message)
            .await
        {
            error!(error = %e, "Failed to record keep-alive outcome");
        }

        telemetry::record_keepalive(config.owner_id, outcome.success);

        if outcome.success {
            info!("Keep-alive success");
        } else {
            warn!(message = %outcome.message, "Keep-alive failed");
        }

        outcome
    }

    /// Runs the signed check-in for one account and records the outcome.
    #[instrument(skip(self, config), fields(owner_id = config.owner_id))]
    pub async fn check_in_account(&self, config: &AccountConfig) -> CheckinOutcome {
        let mut client = match self.client_for(config) {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "Check-in could not build a protocol client");
                return CheckinOutcome::failure(e.to_string());
            }
        };

        let outcome = client
            .sign_in(config.device_major, config.device_minor)
            .await;

        if let Err(e) = self
            .store
            .record_checkin(config.owner_id, outcome.success, &outcome.message)
            .await
        {
            error!(error = %e, "Failed to record check-in outcome");
        }

        telemetry::record_checkin(config.owner_id, outcome.success);

        if outcome.success {
            info!("Auto check-in success");
        } else {
            warn!(message = %outcome.message, "Auto check-in failed");
        }

        outcome
    }

    /// Body of one auto check-in timer firing. The account is re-read
    /// each tick so deactivation or credential loss takes effect without
    /// touching the timer itself.
    #[instrument(skip(self))]
    pub async fn auto_checkin_tick(&self, owner_id: i64) {
        let config = match self.store.get_by_owner(owner_id).await {
            Ok(Some(config)) => config,
            Ok(None) => {
                debug!("Auto check-in tick for an unknown account, skipping");
                return;
            }
            Err(e) => {
                error!(error = %e, "Auto check-in tick could not load the account");
                return;
            }
        };

        if !config.is_active || config.has_empty_credential() {
            debug!("Auto check-in tick skipped: account inactive or without credential");
            return;
        }

        self.check_in_account(&config).await;
    }

    fn client_for(&self, config: &AccountConfig) -> Result<ProtocolClient, ProtocolError> {
        ProtocolClient::new(&self.remote, config.credential())
    }
}
