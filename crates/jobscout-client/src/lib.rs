pub mod config;
pub mod rpc;
pub mod session;

pub use config::ClientConfig;
pub use rpc::ToolInfo;
pub use session::McpToolClient;

use jobscout_core::AppError;
use jobscout_core::retry::RetryingToolClient;

/// Build the production client: session-per-call transport wrapped in retry.
pub fn connect(config: &ClientConfig) -> Result<RetryingToolClient<McpToolClient>, AppError> {
    let client = McpToolClient::new(config)?;
    Ok(RetryingToolClient::new(client, config.retry.clone()))
}
