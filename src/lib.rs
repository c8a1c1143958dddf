//! Azure Resource Manager provider for Hemmer.
//!
//! Manages Azure Analysis Services servers as the
//! `azurerm_analysis_services` resource type. The engine launches the
//! provider binary, reads the handshake from stdout and drives it over gRPC:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! # Provider Protocol
//!
//! - **GetMetadata** / **GetSchema**: resource type names and schemas
//! - **ValidateProviderConfig** / **Configure**: subscription and credentials
//! - **Stop**: graceful shutdown
//! - **ValidateResourceConfig** / **Plan**: declaration checks and diffs
//! - **Create/Read/Update/Delete**: server lifecycle
//! - **ImportResourceState**: adopt an existing server by its resource id
//!
//! # Layout
//!
//! - [`azure`]: resource ids, tags, wire models and the Resource Manager client
//! - [`resources`]: the `azurerm_analysis_services` lifecycle
//! - [`provider`]: the [`ProviderService`] implementation
//! - [`server`]: the gRPC adapter and [`serve`]
//! - [`testing`]: an in-memory client and [`testing::ProviderTester`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod azure;
pub mod config;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use config::{ProviderConfig, ResolvedConfig, Timeouts};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::AzureRmProvider;
pub use schema::ProviderSchema;
pub use server::{serve, serve_with_options, ProviderService, ServeOptions};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::validate;

pub use async_trait::async_trait;
