//! Per-device identifier.
//!
//! Anonymous orders carry the identifier of the device that placed them so
//! the same device can list and track them later without an account.

use std::fmt;

use rand::Rng;

use crate::storage::{LocalStore, keys};

const TOKEN_LEN: usize = 9;

/// Stable identifier of this device, e.g. `dev_k3j9x0q2m_1767225600000`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    /// The identifier saved on this device, if one was ever generated.
    pub fn current(store: &impl LocalStore) -> Option<Self> {
        match store.get(keys::DEVICE_ID) {
            Ok(value) => value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(Self),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read device id");
                None
            }
        }
    }

    /// The saved identifier, generating and saving one on first use.
    ///
    /// If the new identifier cannot be saved it is still returned, so the
    /// caller can proceed; a later call will generate a different one.
    pub fn ensure(store: &impl LocalStore) -> Self {
        if let Some(id) = Self::current(store) {
            return id;
        }
        let id = Self::generate();
        if let Err(e) = store.set(keys::DEVICE_ID, id.as_str()) {
            tracing::warn!(error = %e, "Could not save device id");
        } else {
            tracing::info!(device_id = %id, "Generated device id");
        }
        id
    }

    /// A fresh identifier: `dev_`, nine random base-36 characters, `_` and
    /// the current time in milliseconds.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let token: String = (0..TOKEN_LEN)
            .filter_map(|_| char::from_digit(rng.random_range(0..36), 36))
            .collect();
        let millis = chrono::Utc::now().timestamp_millis();
        Self(format!("dev_{token}_{millis}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
