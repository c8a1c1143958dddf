//! The Azure Resource Manager provider.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::azure::{AnalysisServicesClient, ArmClient};
use crate::config::{provider_config_schema, ProviderConfig, ResolvedConfig};
use crate::error::ProviderError;
use crate::resources::analysis_services::{self, RESOURCE_TYPE};
use crate::resources::AnalysisServicesResource;
use crate::schema::{has_errors, Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

type ClientFactory = dyn Fn(&ResolvedConfig) -> Arc<dyn AnalysisServicesClient> + Send + Sync;

/// Provider serving `azurerm_analysis_services`.
///
/// Resource operations fail with [`ProviderError::Configuration`] until
/// `configure` has succeeded.
pub struct AzureRmProvider {
    client_factory: Box<ClientFactory>,
    resource: RwLock<Option<Arc<AnalysisServicesResource>>>,
}

impl AzureRmProvider {
    /// A provider that talks to Resource Manager over HTTPS.
    pub fn new() -> Self {
        Self::with_client_factory(|config| -> Arc<dyn AnalysisServicesClient> {
            Arc::new(ArmClient::new(config))
        })
    }

    /// A provider whose client is built by `factory` at configure time.
    pub fn with_client_factory<F>(factory: F) -> Self
    where
        F: Fn(&ResolvedConfig) -> Arc<dyn AnalysisServicesClient> + Send + Sync + 'static,
    {
        Self {
            client_factory: Box::new(factory),
            resource: RwLock::new(None),
        }
    }

    async fn resource(
        &self,
        resource_type: &str,
    ) -> Result<Arc<AnalysisServicesResource>, ProviderError> {
        check_resource_type(resource_type)?;
        self.resource.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("provider is not configured".to_string())
        })
    }
}

impl Default for AzureRmProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn check_resource_type(resource_type: &str) -> Result<(), ProviderError> {
    if resource_type == RESOURCE_TYPE {
        Ok(())
    } else {
        Err(ProviderError::UnknownResource(resource_type.to_string()))
    }
}

fn parse_config(config: Value) -> Result<ProviderConfig, Vec<Diagnostic>> {
    ProviderConfig::from_value(config).map_err(|e| {
        vec![Diagnostic::error("Invalid provider configuration").with_detail(e.to_string())]
    })
}

#[async_trait::async_trait]
impl ProviderService for AzureRmProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(provider_config_schema())
            .with_resource(RESOURCE_TYPE, analysis_services::schema())
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = crate::validation::validate(&provider_config_schema(), &config);
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let resolved = parse_config(config).and_then(ProviderConfig::resolve);
        if let Err(errors) = resolved {
            diagnostics.extend(errors);
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, config))]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let resolved = match parse_config(config).and_then(ProviderConfig::resolve) {
            Ok(resolved) => resolved,
            Err(diagnostics) => return Ok(diagnostics),
        };

        let client = (self.client_factory)(&resolved);
        let resource = AnalysisServicesResource::new(client, resolved.timeouts);
        *self.resource.write().await = Some(Arc::new(resource));

        info!(
            subscription_id = %resolved.subscription_id,
            endpoint = %resolved.endpoint,
            "Provider configured"
        );
        Ok(vec![])
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        check_resource_type(resource_type)?;
        Ok(analysis_services::validate(&config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        check_resource_type(resource_type)?;
        Ok(analysis_services::plan(
            prior_state.as_ref(),
            proposed_state,
        ))
    }

    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.resource(resource_type)
            .await?
            .create(planned_state)
            .await
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        self.resource(resource_type).await?.read(current_state).await
    }

    async fn update(
        &self,
        resource_type: &str,
        _prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.resource(resource_type)
            .await?
            .update(planned_state)
            .await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.resource(resource_type)
            .await?
            .delete(current_state)
            .await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.resource(resource_type).await?.import(id).await
    }
}
