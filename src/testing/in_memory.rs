//! An in-memory [`AnalysisServicesClient`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::azure::models::{Server, ServerProperties};
use crate::azure::{AnalysisServicesClient, ClientError, ResourceId};

/// Subscription used when none is given.
pub const TEST_SUBSCRIPTION_ID: &str = "00000000-0000-0000-0000-000000000000";

const SERVER_RESOURCE_TYPE: &str = "Microsoft.AnalysisServices/servers";

/// A client operation, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`AnalysisServicesClient::create`]
    Create,
    /// [`AnalysisServicesClient::get_details`]
    GetDetails,
    /// [`AnalysisServicesClient::delete`]
    Delete,
}

#[derive(Default)]
struct State {
    servers: HashMap<(String, String), Server>,
    failures: HashMap<Operation, ClientError>,
    calls: HashMap<Operation, usize>,
    omit_ids: bool,
    delay: Option<Duration>,
}

/// Stores servers in a map keyed by `(resource_group, name)`.
///
/// Writes complete immediately with `provisioningState: Succeeded`. Ids are
/// derived from the subscription, group and name, so re-creating a server
/// keeps its id.
///
/// ```
/// use hemmer_provider_azurerm::azure::ClientError;
/// use hemmer_provider_azurerm::testing::{InMemoryAnalysisServices, Operation};
///
/// let client = InMemoryAnalysisServices::new();
/// client.fail(Operation::Delete, ClientError::Conflict("locked".into()));
/// assert_eq!(client.calls(Operation::Delete), 0);
/// ```
pub struct InMemoryAnalysisServices {
    subscription_id: String,
    state: Mutex<State>,
}

impl InMemoryAnalysisServices {
    /// An empty store in [`TEST_SUBSCRIPTION_ID`].
    pub fn new() -> Self {
        Self::with_subscription(TEST_SUBSCRIPTION_ID)
    }

    /// An empty store in the given subscription.
    pub fn with_subscription(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every call to `operation` fail with `error` until cleared.
    pub fn fail(&self, operation: Operation, error: ClientError) {
        self.lock().failures.insert(operation, error);
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Return servers without an `id` from `get_details`.
    pub fn omit_ids(&self, omit: bool) {
        self.lock().omit_ids = omit;
    }

    /// Sleep for `delay` before answering each call.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// How many times `operation` has been called.
    pub fn calls(&self, operation: Operation) -> usize {
        self.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    /// The stored server, if any.
    pub fn server(&self, resource_group: &str, name: &str) -> Option<Server> {
        self.lock()
            .servers
            .get(&(resource_group.to_string(), name.to_string()))
            .cloned()
    }

    /// Seed a server as if it had been created out of band. Returns its id.
    pub fn insert(&self, resource_group: &str, name: &str, server: Server) -> String {
        let stored = self.stored(resource_group, name, server);
        let id = stored.id.clone().unwrap_or_default();
        self.lock()
            .servers
            .insert((resource_group.to_string(), name.to_string()), stored);
        id
    }

    /// Number of stored servers.
    pub fn len(&self) -> usize {
        self.lock().servers.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stored(&self, resource_group: &str, name: &str, server: Server) -> Server {
        let id = ResourceId::analysis_server(&self.subscription_id, resource_group, name);
        let full_name = format!(
            "asazure://{}.asazure.windows.net/{}",
            server.location.as_deref().unwrap_or("westus"),
            name
        );
        Server {
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            resource_type: Some(SERVER_RESOURCE_TYPE.to_string()),
            properties: Some(ServerProperties {
                state: Some("Succeeded".to_string()),
                provisioning_state: Some("Succeeded".to_string()),
                server_full_name: Some(full_name),
            }),
            ..server
        }
    }

    /// Count the call, wait out any delay and return an injected failure.
    async fn enter(&self, operation: Operation) -> Result<(), ClientError> {
        let delay = {
            let mut state = self.lock();
            *state.calls.entry(operation).or_insert(0) += 1;
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.lock().failures.get(&operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryAnalysisServices {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(resource_group: &str, name: &str) -> ClientError {
    ClientError::NotFound(format!(
        "Server '{}' not found in resource group '{}'",
        name, resource_group
    ))
}

#[async_trait::async_trait]
impl AnalysisServicesClient for InMemoryAnalysisServices {
    async fn create(
        &self,
        resource_group: &str,
        name: &str,
        server: &Server,
    ) -> Result<Server, ClientError> {
        self.enter(Operation::Create).await?;
        let stored = self.stored(resource_group, name, server.clone());
        self.lock().servers.insert(
            (resource_group.to_string(), name.to_string()),
            stored.clone(),
        );
        Ok(stored)
    }

    async fn get_details(&self, resource_group: &str, name: &str) -> Result<Server, ClientError> {
        self.enter(Operation::GetDetails).await?;
        let state = self.lock();
        let mut server = state
            .servers
            .get(&(resource_group.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| not_found(resource_group, name))?;
        if state.omit_ids {
            server.id = None;
        }
        Ok(server)
    }

    async fn delete(&self, resource_group: &str, name: &str) -> Result<(), ClientError> {
        self.enter(Operation::Delete).await?;
        self.lock()
            .servers
            .remove(&(resource_group.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found(resource_group, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::ResourceSku;
    use tokio_test::{assert_err, assert_ok};

    fn server() -> Server {
        Server {
            location: Some("westus".into()),
            sku: Some(ResourceSku {
                name: "B1".into(),
                tier: Some("Basic".into()),
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_is_an_upsert() {
        let client = InMemoryAnalysisServices::new();
        let first = assert_ok!(client.create("rg1", "acctest1", &server()).await);
        let second = assert_ok!(client.create("rg1", "acctest1", &server()).await);

        assert_eq!(first, second);
        assert_eq!(client.len(), 1);
        assert_eq!(first.provisioning_state(), Some("Succeeded"));
        assert_eq!(
            first.id.as_deref(),
            Some("/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg1/providers/Microsoft.AnalysisServices/servers/acctest1")
        );
    }

    #[tokio::test]
    async fn test_missing_server_is_not_found() {
        let client = InMemoryAnalysisServices::with_subscription("sub");
        let err = assert_err!(client.get_details("rg1", "nope").await);
        assert!(err.is_not_found());
        let err = assert_err!(client.delete("rg1", "nope").await);
        assert!(err.is_not_found());
        assert!(client.is_empty());
    }

    #[tokio::test]
    async fn test_failure_injection_and_counters() {
        let client = InMemoryAnalysisServices::new();
        client.fail(Operation::Create, ClientError::Throttled("quota".into()));

        let err = assert_err!(client.create("rg1", "a", &server()).await);
        assert_eq!(err, ClientError::Throttled("quota".into()));
        assert!(client.is_empty());

        client.clear_failures();
        assert_ok!(client.create("rg1", "a", &server()).await);
        assert_eq!(client.calls(Operation::Create), 2);
        assert_eq!(client.calls(Operation::Delete), 0);
    }

    #[tokio::test]
    async fn test_omit_ids() {
        let client = InMemoryAnalysisServices::new();
        client.insert("rg1", "a", server());
        client.omit_ids(true);

        let fetched = assert_ok!(client.get_details("rg1", "a").await);
        assert!(fetched.id.is_none());
        assert!(client.server("rg1", "a").and_then(|s| s.id).is_some());
    }
}
