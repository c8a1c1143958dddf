//! Azure Resource Manager plumbing: ids, tags, wire models, and clients.

mod arm;
mod auth;
pub mod client;
pub mod location;
pub mod models;
pub mod resource_id;
pub mod tags;

pub use arm::ArmClient;
pub use client::{AnalysisServicesClient, ClientError};
pub use location::normalize_location;
pub use models::{ResourceSku, Server, ServerProperties};
pub use resource_id::{ResourceId, ResourceIdError};
