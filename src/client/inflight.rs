use super::error::{ClientError, ClientResult};
use dashmap::DashSet;
use std::sync::Arc;

/// Refuses a second submission on an entity while the first is pending.
///
/// Keys name the entity being mutated, e.g. `subscription:12`.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    keys: Arc<DashSet<String>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, key: impl Into<String>) -> ClientResult<InFlightGuard> {
        let key = key.into();
        if !self.keys.insert(key.clone()) {
            return Err(ClientError::InFlight(key));
        }
        Ok(InFlightGuard {
            keys: Arc::clone(&self.keys),
            key,
        })
    }

    pub fn is_busy(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// Releases its key on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    keys: Arc<DashSet<String>>,
    key: String,
}

impl InFlightGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.keys.remove(&self.key);
    }
}

pub(crate) fn subscription_key(id: i64) -> String {
    format!("subscription:{id}")
}

pub(crate) fn invoice_key(id: i64) -> String {
    format!("invoice:{id}")
}
