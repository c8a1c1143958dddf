//! Resource types served by this provider.

pub mod analysis_services;

pub use analysis_services::AnalysisServicesResource;
