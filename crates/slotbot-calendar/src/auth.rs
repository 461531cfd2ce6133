//! Bearer tokens for the calendar API
//!
//! A service account key is preferred: tokens are minted from it on demand
//! and refreshed before they expire. A static token is accepted for local
//! testing and short-lived deployments.

use std::fmt;
use std::sync::Arc;

use gcp_auth::{CustomServiceAccount, TokenProvider};
use slotbot_core::CalendarConfig;
use tracing::{debug, info};

use crate::error::{CalendarError, Result};

/// OAuth scope for reading free/busy and inserting events
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// Source of the `Authorization: Bearer` value
#[derive(Clone)]
pub enum CalendarAuth {
    /// Fixed token taken from configuration
    Static(String),
    /// Service account, optionally impersonating a user
    ServiceAccount(Arc<dyn TokenProvider>),
}

impl fmt::Debug for CalendarAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalendarAuth::Static(_) => f.write_str("CalendarAuth::Static(..)"),
            CalendarAuth::ServiceAccount(_) => f.write_str("CalendarAuth::ServiceAccount(..)"),
        }
    }
}

impl CalendarAuth {
    /// Pick the credential from configuration; the service account wins
    pub fn from_config(config: &CalendarConfig) -> Result<Self> {
        if let Some(path) = &config.service_account_path {
            let mut account = CustomServiceAccount::from_file(path).map_err(|e| {
                CalendarError::Auth(format!("Failed to load service account key {}: {}", path, e))
            })?;
            if let Some(user) = &config.delegated_user {
                info!("Calendar service account impersonates {}", user);
                account = account.with_subject(user.clone());
            }
            info!("Calendar authentication: service account ({})", path);
            return Ok(Self::ServiceAccount(Arc::new(account)));
        }

        if !config.access_token.is_empty() {
            info!("Calendar authentication: static access token");
            return Ok(Self::Static(config.access_token.clone()));
        }

        Err(CalendarError::CredentialsNotSet)
    }

    /// Current bearer token; service account tokens are cached by the provider
    pub async fn bearer_token(&self) -> Result<String> {
        match self {
            CalendarAuth::Static(token) => Ok(token.clone()),
            CalendarAuth::ServiceAccount(provider) => {
                let token = provider
                    .token(&[CALENDAR_SCOPE])
                    .await
                    .map_err(|e| CalendarError::Auth(e.to_string()))?;
                debug!("Obtained calendar access token");
                Ok(token.as_str().to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_token() {
        let config = CalendarConfig {
            access_token: "abc".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            CalendarAuth::from_config(&config),
            Ok(CalendarAuth::Static(token)) if token == "abc"
        ));
    }

    #[test]
    fn test_missing_credentials() {
        assert!(matches!(
            CalendarAuth::from_config(&CalendarConfig::default()),
            Err(CalendarError::CredentialsNotSet)
        ));
    }

    #[test]
    fn test_unreadable_service_account_key() {
        let config = CalendarConfig {
            service_account_path: Some("/nonexistent/slotbot-sa.json".to_string()),
            access_token: "abc".to_string(),
            ..Default::default()
        };
        let err = CalendarAuth::from_config(&config).unwrap_err();
        assert!(matches!(err, CalendarError::Auth(_)));
        assert!(err.to_string().contains("/nonexistent/slotbot-sa.json"));
    }

    #[tokio::test]
    async fn test_static_bearer_token() {
        let auth = CalendarAuth::Static("abc".to_string());
        assert_eq!(auth.bearer_token().await.unwrap(), "abc");
    }
}
