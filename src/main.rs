use hemmer_provider_azurerm::{init_logging, serve, AzureRmProvider};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    info!(version = env!("CARGO_PKG_VERSION"), "Starting azurerm provider");
    serve(AzureRmProvider::new()).await?;
    Ok(())
}
