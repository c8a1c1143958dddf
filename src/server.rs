//! gRPC server for the provider protocol.
//!
//! [`ProviderService`] is the typed interface a provider implements; the
//! gRPC adapter decodes JSON payloads, calls into it, and turns
//! [`ProviderError`]s into error diagnostics. [`serve`] binds a loopback
//! port and prints the handshake line the engine waits for.
//!
//! # Signal Handling
//!
//! On SIGTERM or SIGINT the server:
//! 1. Stops accepting new connections
//! 2. Waits for in-flight requests to complete (bounded by
//!    [`ServeOptions::shutdown_timeout`])
//! 3. Calls the provider's `stop()` method

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tonic::transport::Server;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::generated as pb;
use crate::schema::{has_errors, Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::types::{
    ImportedResource, PlanResult, ProviderMetadata, HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};

/// Typed provider interface served over gRPC.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider config schema and all resource schemas.
    fn schema(&self) -> ProviderSchema;

    /// Return provider metadata. Derived from the schema by default.
    fn metadata(&self) -> ProviderMetadata {
        let mut resources: Vec<String> = self.schema().resources.keys().cloned().collect();
        resources.sort();
        ProviderMetadata {
            resources,
            capabilities: Default::default(),
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider with credentials and settings.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Stop the provider gracefully.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource declaration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Plan changes for a resource. `proposed_state` of `null` plans a destroy.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a resource.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Read the current state of a resource.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    /// Update a resource in place.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Import existing infrastructure by id.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::Sdk(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }
}

/// Adapter from the generated gRPC trait to [`ProviderService`].
struct ProviderGrpcService<P: ProviderService> {
    provider: Arc<P>,
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<pb::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| pb::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Error => pb::diagnostic::Severity::Error as i32,
                DiagnosticSeverity::Warning => pb::diagnostic::Severity::Warning as i32,
            },
            summary: d.summary,
            detail: d.detail.unwrap_or_default(),
            attribute: d.attribute.unwrap_or_default(),
        })
        .collect()
}

fn error_to_diagnostics(err: ProviderError) -> Vec<pb::Diagnostic> {
    diagnostics_to_proto(vec![Diagnostic::error(err.to_string())])
}

fn schema_to_proto(schema: &crate::schema::Schema) -> pb::Schema {
    let block = &schema.block;
    pb::Schema {
        version: schema.version as i64,
        block: Some(pb::Block {
            attributes: schema
                .attributes()
                .map(|(name, attr)| pb::Attribute {
                    name: name.to_string(),
                    r#type: serde_json::to_vec(&attr.attr_type).unwrap_or_default(),
                    required: attr.flags.required,
                    optional: attr.flags.optional,
                    computed: attr.flags.computed,
                    sensitive: attr.flags.sensitive,
                    description: attr.description.clone().unwrap_or_default(),
                    force_new: attr.force_new,
                    default_value: attr
                        .default
                        .as_ref()
                        .map(encode)
                        .unwrap_or_default(),
                })
                .collect(),
            description: block.description.clone().unwrap_or_default(),
        }),
    }
}

/// Decode a JSON payload. Empty bytes decode to `null`.
fn decode(bytes: &[u8], field: &str) -> Result<Value, ProviderError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes)
        .map_err(|e| ProviderError::InvalidRequest(format!("{} is not valid JSON: {}", field, e)))
}

fn encode(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

fn log_diagnostics(operation: &str, resource_type: &str, diagnostics: &[Diagnostic]) {
    if has_errors(diagnostics) {
        warn!(
            operation,
            resource_type,
            diagnostics = diagnostics.len(),
            "Completed with errors"
        );
    } else {
        info!(operation, resource_type, "Completed successfully");
    }
}

type GrpcResult<T> = Result<tonic::Response<T>, tonic::Status>;

#[tonic::async_trait]
impl<P: ProviderService> pb::provider_server::Provider for ProviderGrpcService<P> {
    #[instrument(skip(self, _request), name = "grpc.get_metadata")]
    async fn get_metadata(
        &self,
        _request: tonic::Request<pb::GetMetadataRequest>,
    ) -> GrpcResult<pb::GetMetadataResponse> {
        let metadata = self.provider.metadata();
        info!(resources = metadata.resources.len(), "GetMetadata completed");
        Ok(tonic::Response::new(pb::GetMetadataResponse {
            server_capabilities: Some(pb::ServerCapabilities {
                plan_destroy: metadata.capabilities.plan_destroy,
            }),
            resources: metadata.resources,
            diagnostics: vec![],
        }))
    }

    #[instrument(skip(self, _request), name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: tonic::Request<pb::GetSchemaRequest>,
    ) -> GrpcResult<pb::GetSchemaResponse> {
        let schema = self.provider.schema();
        info!(resources = schema.resources.len(), "GetSchema completed");
        Ok(tonic::Response::new(pb::GetSchemaResponse {
            provider: Some(schema_to_proto(&schema.provider)),
            resources: schema
                .resources
                .iter()
                .map(|(k, v)| (k.clone(), schema_to_proto(v)))
                .collect(),
            diagnostics: vec![],
        }))
    }

    #[instrument(skip(self, request), name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: tonic::Request<pb::ValidateProviderConfigRequest>,
    ) -> GrpcResult<pb::ValidateProviderConfigResponse> {
        let req = request.into_inner();
        let result = match decode(&req.config, "config") {
            Ok(config) => self.provider.validate_provider_config(config).await,
            Err(e) => Err(e),
        };

        let diagnostics = match result {
            Ok(diagnostics) => {
                log_diagnostics("ValidateProviderConfig", "", &diagnostics);
                diagnostics_to_proto(diagnostics)
            }
            Err(e) => {
                error!(error = %e, "ValidateProviderConfig failed");
                error_to_diagnostics(e)
            }
        };
        Ok(tonic::Response::new(pb::ValidateProviderConfigResponse {
            diagnostics,
        }))
    }

    #[instrument(skip(self, request), name = "grpc.configure")]
    async fn configure(
        &self,
        request: tonic::Request<pb::ConfigureRequest>,
    ) -> GrpcResult<pb::ConfigureResponse> {
        let req = request.into_inner();
        let result = match decode(&req.config, "config") {
            Ok(config) => self.provider.configure(config).await,
            Err(e) => Err(e),
        };

        let diagnostics = match result {
            Ok(diagnostics) => {
                log_diagnostics("Configure", "", &diagnostics);
                diagnostics_to_proto(diagnostics)
            }
            Err(e) => {
                error!(error = %e, "Configure failed");
                error_to_diagnostics(e)
            }
        };
        Ok(tonic::Response::new(pb::ConfigureResponse { diagnostics }))
    }

    #[instrument(skip(self, _request), name = "grpc.stop")]
    async fn stop(&self, _request: tonic::Request<pb::StopRequest>) -> GrpcResult<pb::StopResponse> {
        info!("Stop called");
        let error = match self.provider.stop().await {
            Ok(()) => String::new(),
            Err(e) => {
                error!(error = %e, "Stop failed");
                e.to_string()
            }
        };
        Ok(tonic::Response::new(pb::StopResponse { error }))
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type), name = "grpc.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        request: tonic::Request<pb::ValidateResourceConfigRequest>,
    ) -> GrpcResult<pb::ValidateResourceConfigResponse> {
        let req = request.into_inner();
        let result = match decode(&req.config, "config") {
            Ok(config) => {
                self.provider
                    .validate_resource_config(&req.resource_type, config)
                    .await
            }
            Err(e) => Err(e),
        };

        let diagnostics = match result {
            Ok(diagnostics) => {
                log_diagnostics("ValidateResourceConfig", &req.resource_type, &diagnostics);
                diagnostics_to_proto(diagnostics)
            }
            Err(e) => {
                error!(error = %e, "ValidateResourceConfig failed");
                error_to_diagnostics(e)
            }
        };
        Ok(tonic::Response::new(pb::ValidateResourceConfigResponse {
            diagnostics,
        }))
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type), name = "grpc.plan")]
    async fn plan(&self, request: tonic::Request<pb::PlanRequest>) -> GrpcResult<pb::PlanResponse> {
        let req = request.into_inner();
        debug!(is_create = req.prior_state.is_empty(), "Plan called");

        let result: Result<PlanResult, ProviderError> = async {
            let prior_state = decode(&req.prior_state, "prior_state")?;
            let prior_state = Some(prior_state).filter(|v| !v.is_null());
            let proposed_state = decode(&req.proposed_state, "proposed_state")?;
            let config = decode(&req.config, "config")?;
            self.provider
                .plan(&req.resource_type, prior_state, proposed_state, config)
                .await
        }
        .await;

        match result {
            Ok(plan) => {
                info!(
                    changes = plan.changes.len(),
                    requires_replace = plan.requires_replace,
                    "Plan completed"
                );
                Ok(tonic::Response::new(pb::PlanResponse {
                    planned_state: encode(&plan.planned_state),
                    changes: plan.changes.into_iter().map(Into::into).collect(),
                    requires_replace: plan.requires_replace,
                    diagnostics: vec![],
                }))
            }
            Err(e) => {
                error!(error = %e, "Plan failed");
                Ok(tonic::Response::new(pb::PlanResponse {
                    planned_state: vec![],
                    changes: vec![],
                    requires_replace: false,
                    diagnostics: error_to_diagnostics(e),
                }))
            }
        }
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type), name = "grpc.create")]
    async fn create(&self, request: tonic::Request<pb::CreateRequest>) -> GrpcResult<pb::CreateResponse> {
        let req = request.into_inner();
        info!("Create called");
        let result = match decode(&req.planned_state, "planned_state") {
            Ok(planned) => self.provider.create(&req.resource_type, planned).await,
            Err(e) => Err(e),
        };

        let (state, diagnostics) = state_response("Create", result);
        Ok(tonic::Response::new(pb::CreateResponse { state, diagnostics }))
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type), name = "grpc.read")]
    async fn read(&self, request: tonic::Request<pb::ReadRequest>) -> GrpcResult<pb::ReadResponse> {
        let req = request.into_inner();
        debug!("Read called");
        let result = match decode(&req.current_state, "current_state") {
            Ok(current) => self.provider.read(&req.resource_type, current).await,
            Err(e) => Err(e),
        };

        let (state, diagnostics) = state_response("Read", result);
        Ok(tonic::Response::new(pb::ReadResponse { state, diagnostics }))
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type), name = "grpc.update")]
    async fn update(&self, request: tonic::Request<pb::UpdateRequest>) -> GrpcResult<pb::UpdateResponse> {
        let req = request.into_inner();
        info!("Update called");
        let result: Result<Value, ProviderError> = async {
            let prior = decode(&req.prior_state, "prior_state")?;
            let planned = decode(&req.planned_state, "planned_state")?;
            self.provider.update(&req.resource_type, prior, planned).await
        }
        .await;

        let (state, diagnostics) = state_response("Update", result);
        Ok(tonic::Response::new(pb::UpdateResponse { state, diagnostics }))
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type), name = "grpc.delete")]
    async fn delete(&self, request: tonic::Request<pb::DeleteRequest>) -> GrpcResult<pb::DeleteResponse> {
        let req = request.into_inner();
        info!("Delete called");
        let result = match decode(&req.current_state, "current_state") {
            Ok(current) => self.provider.delete(&req.resource_type, current).await,
            Err(e) => Err(e),
        };

        let diagnostics = match result {
            Ok(()) => {
                info!("Delete completed successfully");
                vec![]
            }
            Err(e) => {
                error!(error = %e, "Delete failed");
                error_to_diagnostics(e)
            }
        };
        Ok(tonic::Response::new(pb::DeleteResponse { diagnostics }))
    }

    #[instrument(skip(self, request), fields(resource_type = %request.get_ref().resource_type, id = %request.get_ref().id), name = "grpc.import_resource_state")]
    async fn import_resource_state(
        &self,
        request: tonic::Request<pb::ImportResourceStateRequest>,
    ) -> GrpcResult<pb::ImportResourceStateResponse> {
        let req = request.into_inner();
        info!("ImportResourceState called");

        match self.provider.import_resource(&req.resource_type, &req.id).await {
            Ok(imported) => {
                info!(imported_count = imported.len(), "ImportResourceState completed");
                Ok(tonic::Response::new(pb::ImportResourceStateResponse {
                    imported: imported
                        .into_iter()
                        .map(|r| pb::ImportedResource {
                            resource_type: r.resource_type,
                            state: encode(&r.state),
                        })
                        .collect(),
                    diagnostics: vec![],
                }))
            }
            Err(e) => {
                error!(error = %e, "ImportResourceState failed");
                Ok(tonic::Response::new(pb::ImportResourceStateResponse {
                    imported: vec![],
                    diagnostics: error_to_diagnostics(e),
                }))
            }
        }
    }
}

/// Encode a state-returning result as `(state, diagnostics)`.
fn state_response(
    operation: &str,
    result: Result<Value, ProviderError>,
) -> (Vec<u8>, Vec<pb::Diagnostic>) {
    match result {
        Ok(state) => {
            info!(operation, "Completed successfully");
            (encode(&state), vec![])
        }
        Err(e) => {
            error!(operation, error = %e, "Failed");
            (vec![], error_to_diagnostics(e))
        }
    }
}

/// Options for configuring the provider server.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// How long to wait for in-flight requests after a shutdown signal.
    /// Default: 30 seconds.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    /// Create new serve options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Wait for SIGTERM or SIGINT (CTRL+C on Windows).
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
        }
    }

    #[cfg(windows)]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");
        info!("Received CTRL+C, initiating graceful shutdown");
    }

    #[cfg(not(any(unix, windows)))]
    {
        std::future::pending::<()>().await;
    }
}

/// Serve a provider on an ephemeral loopback port.
///
/// Prints `HEMMER_PROVIDER|<version>|<address>` to stdout once the port is
/// bound, then serves until a shutdown signal arrives.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), ProviderError> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// Serve a provider on an ephemeral loopback port with custom options.
pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), ProviderError> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    serve_on_listener(provider, listener, options, wait_for_shutdown_signal()).await
}

/// Serve until `shutdown` resolves, then drain for at most
/// `options.shutdown_timeout` and stop the provider.
async fn serve_on_listener<P, S>(
    provider: P,
    listener: TcpListener,
    options: ServeOptions,
    shutdown: S,
) -> Result<(), ProviderError>
where
    P: ProviderService,
    S: Future<Output = ()>,
{
    let addr = listener.local_addr()?;
    println!("{}|{}|{}", HANDSHAKE_PREFIX, PROTOCOL_VERSION, addr);
    info!(address = %addr, "Provider server starting");

    let provider = Arc::new(provider);
    let grpc_service = ProviderGrpcService {
        provider: Arc::clone(&provider),
    };

    let (drain_tx, drain_rx) = oneshot::channel::<()>();
    let server = Server::builder()
        .add_service(pb::provider_server::ProviderServer::new(grpc_service))
        .serve_with_incoming_shutdown(
            tokio_stream::wrappers::TcpListenerStream::new(listener),
            async move {
                let _ = drain_rx.await;
            },
        );
    tokio::pin!(server);

    let signalled = tokio::select! {
        result = &mut server => {
            if let Err(e) = result {
                error!(error = %e, "Server error");
                return Err(e.into());
            }
            false
        }
        () = shutdown => true,
    };

    if signalled {
        let _ = drain_tx.send(());
        match tokio::time::timeout(options.shutdown_timeout, server).await {
            Ok(Ok(())) => info!("Server shutdown complete"),
            Ok(Err(e)) => {
                error!(error = %e, "Server error during shutdown");
                return Err(e.into());
            }
            Err(_) => warn!(
                timeout = ?options.shutdown_timeout,
                "Shutdown timeout exceeded, forcing shutdown"
            ),
        }
    }

    if let Err(e) = provider.stop().await {
        warn!(error = %e, "Provider stop() returned error");
    }
    info!("Provider shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generated::provider_server::Provider;
    use crate::testing::InMemoryAnalysisServices;
    use crate::AzureRmProvider;
    use serde_json::json;
    use tokio_test::assert_ok;

    fn provider() -> AzureRmProvider {
        let client: Arc<dyn crate::azure::AnalysisServicesClient> =
            Arc::new(InMemoryAnalysisServices::new());
        AzureRmProvider::with_client_factory(move |_| client.clone())
    }

    fn service() -> ProviderGrpcService<AzureRmProvider> {
        ProviderGrpcService {
            provider: Arc::new(provider()),
        }
    }

    fn bytes(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode(b"", "state").unwrap(), Value::Null);
        assert_eq!(decode(b"{\"a\":1}", "state").unwrap(), json!({"a": 1}));
        assert!(matches!(
            decode(b"{not json", "state"),
            Err(ProviderError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_get_schema_and_metadata() {
        let service = service();
        let metadata = assert_ok!(
            service
                .get_metadata(tonic::Request::new(pb::GetMetadataRequest {}))
                .await
        )
        .into_inner();
        assert_eq!(metadata.resources, vec!["azurerm_analysis_services"]);

        let schema = assert_ok!(
            service
                .get_schema(tonic::Request::new(pb::GetSchemaRequest {}))
                .await
        )
        .into_inner();
        let block = schema.resources["azurerm_analysis_services"]
            .block
            .clone()
            .unwrap_or_default();
        let name = block.attributes.iter().find(|a| a.name == "name");
        assert!(name.is_some_and(|a| a.required && a.force_new));
        let id = block.attributes.iter().find(|a| a.name == "id");
        assert!(id.is_some_and(|a| a.computed && !a.required));
    }

    #[tokio::test]
    async fn test_invalid_json_becomes_diagnostic() {
        let response = assert_ok!(
            service()
                .read(tonic::Request::new(pb::ReadRequest {
                    resource_type: "azurerm_analysis_services".into(),
                    current_state: b"{oops".to_vec(),
                }))
                .await
        )
        .into_inner();

        assert!(response.state.is_empty());
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(
            response.diagnostics[0].severity,
            pb::diagnostic::Severity::Error as i32
        );
        assert!(response.diagnostics[0].summary.contains("current_state"));
    }

    #[tokio::test]
    async fn test_create_and_read_over_grpc() {
        let service = service();
        let configured = assert_ok!(
            service
                .configure(tonic::Request::new(pb::ConfigureRequest {
                    config: bytes(json!({"subscription_id": "sub", "access_token": "token"})),
                }))
                .await
        )
        .into_inner();
        assert!(configured.diagnostics.is_empty());

        let declaration = json!({
            "name": "acctest1",
            "resource_group_name": "rg1",
            "location": "West US",
            "sku_name": "B1",
            "sku_tier": "Basic",
        });
        let plan = assert_ok!(
            service
                .plan(tonic::Request::new(pb::PlanRequest {
                    resource_type: "azurerm_analysis_services".into(),
                    prior_state: vec![],
                    proposed_state: bytes(declaration.clone()),
                    config: bytes(declaration),
                }))
                .await
        )
        .into_inner();
        assert!(plan.diagnostics.is_empty());
        assert!(!plan.requires_replace);

        let created = assert_ok!(
            service
                .create(tonic::Request::new(pb::CreateRequest {
                    resource_type: "azurerm_analysis_services".into(),
                    planned_state: plan.planned_state,
                }))
                .await
        )
        .into_inner();
        assert!(created.diagnostics.is_empty());

        let state: Value = serde_json::from_slice(&created.state).unwrap();
        assert_eq!(state["location"], "westus");
        assert!(state["id"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_unconfigured_delete_reports_error() {
        let response = assert_ok!(
            service()
                .delete(tonic::Request::new(pb::DeleteRequest {
                    resource_type: "azurerm_analysis_services".into(),
                    current_state: bytes(json!({"id": "/x"})),
                }))
                .await
        )
        .into_inner();
        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].summary.contains("not configured"));
    }

    #[tokio::test]
    async fn test_serves_past_shutdown_timeout_until_signalled() {
        let listener = assert_ok!(TcpListener::bind("127.0.0.1:0").await);
        let addr = assert_ok!(listener.local_addr());
        let (signal_tx, signal_rx) = oneshot::channel::<()>();
        let options = ServeOptions::new().with_shutdown_timeout(Duration::from_millis(50));

        let handle = tokio::spawn(serve_on_listener(
            provider(),
            listener,
            options,
            async move {
                let _ = signal_rx.await;
            },
        ));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!handle.is_finished());
        assert_ok!(tokio::net::TcpStream::connect(addr).await);

        assert_ok!(signal_tx.send(()));
        let result = assert_ok!(tokio::time::timeout(Duration::from_secs(5), handle).await);
        assert_ok!(assert_ok!(result));
    }

    #[test]
    fn test_serve_options() {
        let options = ServeOptions::new().with_shutdown_timeout(Duration::from_secs(5));
        assert_eq!(options.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(ServeOptions::default().shutdown_timeout, Duration::from_secs(30));
    }
}
