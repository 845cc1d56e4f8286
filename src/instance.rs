use crate::client::FetchClient;
use crate::config::InstanceConfig;
use crate::error::FetchError;
use crate::settings::ConnectionSettings;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Header carrying the opaque instance identity on inbound calls.
pub const INSTANCE_ID_HEADER: &str = "x-instance-id";

/// Maps an inbound call's instance identity to its client.
pub trait InstanceProvider: Send + Sync {
    fn resolve(&self, instance_id: &str) -> Result<Arc<FetchClient>, FetchError>;
}

/// In-process registry of configured instances.
///
/// Clients are built on first use and cached for the registry's lifetime, so
/// invalid TLS material surfaces as a resolution failure for that instance
/// only.
pub struct InstanceManager {
    settings: HashMap<String, ConnectionSettings>,
    clients: RwLock<HashMap<String, Arc<FetchClient>>>,
    default_timeout: Option<Duration>,
}

impl InstanceManager {
    pub fn new(instances: Vec<InstanceConfig>, default_timeout: Option<Duration>) -> Self {
        let settings = instances
            .into_iter()
            .map(|instance| (instance.id, instance.settings))
            .collect();
        Self {
            settings,
            clients: RwLock::new(HashMap::new()),
            default_timeout,
        }
    }

    pub fn instance_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.settings.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    fn cached(&self, instance_id: &str) -> Option<Arc<FetchClient>> {
        self.clients
            .read()
            .ok()
            .and_then(|clients| clients.get(instance_id).cloned())
    }
}

impl InstanceProvider for InstanceManager {
    fn resolve(&self, instance_id: &str) -> Result<Arc<FetchClient>, FetchError> {
        if let Some(client) = self.cached(instance_id) {
            return Ok(client);
        }

        let settings = self
            .settings
            .get(instance_id)
            .ok_or_else(|| FetchError::InstanceNotFound(instance_id.to_string()))?;

        let mut clients = self
            .clients
            .write()
            .map_err(|_| FetchError::Configuration("instance registry lock poisoned".to_string()))?;

        // Another call may have built it while we waited for the lock.
        if let Some(client) = clients.get(instance_id) {
            return Ok(client.clone());
        }

        debug!("Building client for instance '{}'", instance_id);
        let client = Arc::new(FetchClient::new(settings.clone())?.with_default_timeout(self.default_timeout));
        clients.insert(instance_id.to_string(), client.clone());
        info!("Instance '{}' ready (base URL: {})", instance_id, settings.url);
        Ok(client)
    }
}
