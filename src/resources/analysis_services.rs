//! The `azurerm_analysis_services` resource.
//!
//! Create and update both PUT the full server definition, look the server up
//! again to learn its id, then refresh state from the remote record. Read
//! treats a missing server as drift and clears `id` instead of failing.
//! Delete only ever targets the single server named by the id.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, field, info, instrument, warn, Span};

use crate::azure::tags::{expand_tags, flatten_tags, validate_tags};
use crate::azure::{
    normalize_location, AnalysisServicesClient, ResourceId, ResourceIdError, ResourceSku, Server,
};
use crate::config::Timeouts;
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::types::{ImportedResource, PlanResult};

/// Resource type name.
pub const RESOURCE_TYPE: &str = "azurerm_analysis_services";

/// Schema of `azurerm_analysis_services`.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("An Azure Analysis Services server.")
        .with_attribute(
            "id",
            Attribute::computed_string().with_description("Resource Manager id of the server."),
        )
        .with_attribute(
            "name",
            Attribute::required_string()
                .with_force_new()
                .with_description("Name of the server."),
        )
        .with_attribute(
            "resource_group_name",
            Attribute::required_string()
                .with_force_new()
                .with_description("Resource group the server is created in."),
        )
        .with_attribute(
            "location",
            Attribute::required_string()
                .with_force_new()
                .with_description("Azure region. Stored lower-cased without spaces."),
        )
        .with_attribute(
            "sku_name",
            Attribute::required_string()
                .with_force_new()
                .with_description("SKU name, e.g. B1 or S0."),
        )
        .with_attribute(
            "sku_tier",
            Attribute::required_string()
                .with_force_new()
                .with_description("SKU tier, e.g. Basic or Standard."),
        )
        .with_attribute("tags", Attribute::optional_string_map())
}

/// Validate a declaration against the schema and the ARM tag limits.
pub fn validate(config: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = crate::validation::validate(&schema(), config);
    if let Some(tags @ Value::Object(_)) = config.get("tags") {
        diagnostics.extend(validate_tags(Some(tags)));
    }
    diagnostics
}

/// Bring a declaration into the form read produces: location normalized
/// and absent tags as an empty map.
pub fn normalize(mut value: Value) -> Value {
    if let Value::Object(map) = &mut value {
        if let Some(Value::String(location)) = map.get_mut("location") {
            *location = normalize_location(location);
        }
        let tags = map.entry("tags").or_insert(Value::Null);
        if tags.is_null() {
            *tags = Value::Object(Map::new());
        }
    }
    value
}

/// Plan a change from `prior` to the proposed declaration.
///
/// A prior state without an id describes a server that no longer exists, so
/// it plans a create.
pub fn plan(prior: Option<&Value>, proposed: Value) -> PlanResult {
    let prior = prior.filter(|state| state_id(state).is_some());
    crate::plan::plan(&schema(), prior, &normalize(proposed))
}

/// The declared fields needed to build a PUT request.
#[derive(Debug, Clone, Deserialize)]
struct Declaration {
    name: String,
    resource_group_name: String,
    location: String,
    sku_name: String,
    sku_tier: String,
    tags: Option<Value>,
}

impl Declaration {
    fn from_state(state: &Value) -> Result<Self, ProviderError> {
        Self::deserialize(state).map_err(|e| {
            ProviderError::Validation(format!("invalid {} configuration: {}", RESOURCE_TYPE, e))
        })
    }

    fn to_server(&self) -> Result<Server, ProviderError> {
        let tags = expand_tags(self.tags.as_ref()).map_err(ProviderError::Validation)?;
        Ok(Server {
            name: Some(self.name.clone()),
            location: Some(normalize_location(&self.location)),
            sku: Some(ResourceSku {
                name: self.sku_name.clone(),
                tier: Some(self.sku_tier.clone()),
            }),
            tags: Some(tags),
            ..Default::default()
        })
    }
}

/// Lifecycle operations for `azurerm_analysis_services`.
pub struct AnalysisServicesResource {
    client: Arc<dyn AnalysisServicesClient>,
    timeouts: Timeouts,
}

impl AnalysisServicesResource {
    /// Create a handler that talks to Azure through `client`.
    pub fn new(client: Arc<dyn AnalysisServicesClient>, timeouts: Timeouts) -> Self {
        Self { client, timeouts }
    }

    /// Create the server described by `planned` and return the refreshed state.
    #[instrument(skip(self, planned), fields(resource_group = field::Empty, name = field::Empty))]
    pub async fn create(&self, planned: Value) -> Result<Value, ProviderError> {
        with_deadline("create", self.timeouts.create, self.put(planned, "creating")).await
    }

    /// Re-submit the full definition in `planned`. The PUT is an upsert, so
    /// this is the same request create sends.
    #[instrument(skip(self, planned), fields(resource_group = field::Empty, name = field::Empty))]
    pub async fn update(&self, planned: Value) -> Result<Value, ProviderError> {
        with_deadline("update", self.timeouts.update, self.put(planned, "updating")).await
    }

    /// Refresh `state` from Azure.
    #[instrument(skip(self, state), fields(resource_group = field::Empty, name = field::Empty))]
    pub async fn read(&self, state: Value) -> Result<Value, ProviderError> {
        with_deadline("read", self.timeouts.read, self.refresh(state)).await
    }

    /// Delete the server addressed by `state.id`.
    #[instrument(skip(self, state), fields(resource_group = field::Empty, name = field::Empty))]
    pub async fn delete(&self, state: Value) -> Result<(), ProviderError> {
        with_deadline("delete", self.timeouts.delete, async {
            let id = state_id(&state).ok_or_else(|| {
                ProviderError::InvalidRequest(format!(
                    "cannot delete {} without an id in state",
                    RESOURCE_TYPE
                ))
            })?;
            let (group, name) = parse_server_id(id)?;
            record_target(&group, &name);

            info!("Deleting Analysis Server");
            self.client.delete(&group, &name).await.map_err(|e| {
                ProviderError::from_client(
                    e,
                    format!(
                        "Error deleting Analysis Server {} (resource group {})",
                        name, group
                    ),
                )
            })
        })
        .await
    }

    /// Import an existing server by id.
    #[instrument(skip(self), fields(resource_group = field::Empty, name = field::Empty))]
    pub async fn import(&self, id: &str) -> Result<Vec<ImportedResource>, ProviderError> {
        with_deadline("import", self.timeouts.read, async {
            parse_server_id(id)?;
            let state = self.refresh(json!({ "id": id })).await?;
            if state_id(&state).is_none() {
                return Err(ProviderError::NotFound(format!(
                    "Cannot import non-existent Analysis Server {:?}",
                    id
                )));
            }
            Ok(vec![ImportedResource::new(RESOURCE_TYPE, state)])
        })
        .await
    }

    async fn put(&self, planned: Value, verb: &str) -> Result<Value, ProviderError> {
        let declaration = Declaration::from_state(&planned)?;
        let group = declaration.resource_group_name.as_str();
        let name = declaration.name.as_str();
        record_target(group, name);
        let server = declaration.to_server()?;

        info!(verb, "Submitting Analysis Server");
        self.client.create(group, name, &server).await.map_err(|e| {
            ProviderError::from_client(
                e,
                format!(
                    "Error {} Analysis Server {} (resource group {})",
                    verb, name, group
                ),
            )
        })?;

        let details = self.client.get_details(group, name).await.map_err(|e| {
            ProviderError::from_client(
                e,
                format!(
                    "Error retrieving Analysis Server {} (resource group {})",
                    name, group
                ),
            )
        })?;
        let id = details.id.filter(|id| !id.is_empty()).ok_or_else(|| {
            ProviderError::Sdk(format!(
                "Cannot read Analysis Server {} (resource group {}) ID",
                name, group
            ))
        })?;

        let mut state = normalize(planned);
        if let Value::Object(map) = &mut state {
            map.insert("id".to_string(), Value::String(id));
        }
        self.refresh(state).await
    }

    async fn refresh(&self, mut state: Value) -> Result<Value, ProviderError> {
        let Some(id) = state_id(&state).map(str::to_string) else {
            debug!("State has no id, nothing to read");
            return Ok(state);
        };
        let (group, name) = parse_server_id(&id)?;
        record_target(&group, &name);

        let server = match self.client.get_details(&group, &name).await {
            Ok(server) => server,
            Err(e) if e.is_not_found() => {
                warn!(id = %id, "Analysis Server not found, removing from state");
                if let Value::Object(map) = &mut state {
                    map.insert("id".to_string(), Value::Null);
                }
                return Ok(state);
            }
            Err(e) => {
                return Err(ProviderError::from_client(
                    e,
                    format!("Error making Read request on Azure Analysis Server {}", name),
                ))
            }
        };

        if let Value::Object(map) = &mut state {
            copy_server_into(map, &group, &name, server);
        }
        Ok(state)
    }
}

fn copy_server_into(map: &mut Map<String, Value>, group: &str, name: &str, server: Server) {
    map.insert(
        "name".to_string(),
        Value::String(server.name.unwrap_or_else(|| name.to_string())),
    );
    map.insert(
        "resource_group_name".to_string(),
        Value::String(group.to_string()),
    );
    if let Some(location) = server.location {
        map.insert(
            "location".to_string(),
            Value::String(normalize_location(&location)),
        );
    }
    if let Some(sku) = server.sku {
        map.insert("sku_name".to_string(), Value::String(sku.name));
        map.insert(
            "sku_tier".to_string(),
            sku.tier.map(Value::String).unwrap_or(Value::Null),
        );
    }
    map.insert("tags".to_string(), flatten_tags(server.tags.as_ref()));
}

fn state_id(state: &Value) -> Option<&str> {
    state
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

/// Split a server id into `(resource_group, name)`.
fn parse_server_id(id: &str) -> Result<(String, String), ProviderError> {
    let invalid = |e: ResourceIdError| {
        ProviderError::InvalidRequest(format!(
            "cannot parse Analysis Server id {:?}: {}",
            id, e
        ))
    };
    let parsed: ResourceId = id.parse().map_err(invalid)?;
    let (group, name) = parsed.analysis_server_parts().map_err(invalid)?;
    Ok((group.to_string(), name.to_string()))
}

fn record_target(group: &str, name: &str) {
    let span = Span::current();
    span.record("resource_group", group);
    span.record("name", name);
}

async fn with_deadline<T>(
    operation: &str,
    deadline: Duration,
    fut: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, ProviderError> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::DeadlineExceeded(format!(
            "{} of {} did not finish within {:?}",
            operation, RESOURCE_TYPE, deadline
        ))),
    }
}
