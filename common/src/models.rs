// Domain models shared by the scheduler, protocol client, and store
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use crate::credential::SessionCredential;

/// One managed account: its remote credential, beacon identity, and
/// automation state as persisted in `account_configs`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccountConfig {
    pub owner_id: i64,
    pub session_credential: String,
    pub device_major: i32,
    pub device_minor: i32,
    pub is_active: bool,
    pub last_keepalive_at: Option<DateTime<Utc>>,
    pub last_checkin_at: Option<DateTime<Utc>>,
    pub last_checkin_result: Option<String>,
    pub last_log: Option<String>,
    pub auto_checkin_expire_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AccountConfig {
    /// Parses the stored credential string into its structured form.
    pub fn credential(&self) -> SessionCredential {
        SessionCredential::parse(&self.session_credential)
    }

    /// True when the stored credential string carries no fields at all.
    pub fn has_empty_credential(&self) -> bool {
        self.credential().is_empty()
    }
}

/// Identity of a scheduled job inside the registry.
///
/// The sweep is a singleton; auto check-in jobs are keyed per account so
/// re-enabling replaces the previous job instead of stacking a second one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobKey {
    Sweep,
    AutoCheckin(i64),
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKey::Sweep => write!(f, "sweep"),
            JobKey::AutoCheckin(owner_id) => write!(f, "auto_checkin_{}", owner_id),
        }
    }
}

/// Result of one keep-alive exchange.
///
/// `rotated_credential` carries the merged credential whenever the server
/// sent replacement cookie pairs, even if the exchange itself failed after
/// the rotation arrived. Callers persist it regardless of `success`.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub success: bool,
    pub message: String,
    pub rotated_credential: Option<SessionCredential>,
}

impl RefreshOutcome {
    pub fn success(message: impl Into<String>, rotated: Option<SessionCredential>) -> Self {
        Self {
            success: true,
            message: message.into(),
            rotated_credential: rotated,
        }
    }

    pub fn failure(message: impl Into<String>, rotated: Option<SessionCredential>) -> Self {
        Self {
            success: false,
            message: message.into(),
            rotated_credential: rotated,
        }
    }
}

/// Result of one signed check-in attempt.
#[derive(Debug, Clone)]
pub struct CheckinOutcome {
    pub success: bool,
    pub message: String,
}

impl CheckinOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_key_display() {
        assert_eq!(JobKey::Sweep.to_string(), "sweep");
        assert_eq!(JobKey::AutoCheckin(42).to_string(), "auto_checkin_42");
    }

    #[test]
    fn test_job_key_equality_by_owner() {
        assert_eq!(JobKey::AutoCheckin(7), JobKey::AutoCheckin(7));
        assert_ne!(JobKey::AutoCheckin(7), JobKey::AutoCheckin(8));
        assert_ne!(JobKey::Sweep, JobKey::AutoCheckin(0));
    }

    #[test]
    fn test_empty_credential_detection() {
        let mut config = sample_config();
        assert!(!config.has_empty_credential());

        config.session_credential = "   ".to_string();
        assert!(config.has_empty_credential());
    }

    fn sample_config() -> AccountConfig {
        AccountConfig {
            owner_id: 1,
            session_credential: "wechatSESS_ID=abc; SERVERID=node1".to_string(),
            device_major: 10113,
            device_minor: 25340,
            is_active: true,
            last_keepalive_at: None,
            last_checkin_at: None,
            last_checkin_result: None,
            last_log: None,
            auto_checkin_expire_at: None,
            created_at: Utc::now(),
        }
    }
}
