use crate::{
    config::SessionConfig,
    guard::EdgeGuard,
    server,
    token::{SystemClock, TokenValidator},
};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub config: SessionConfig,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    info!(
        port = args.port,
        cookie = args.config.cookie_name(),
        protected = ?args.config.routes().protected(),
        auth_only = ?args.config.routes().auth_only(),
        "starting edge guard"
    );

    let validator = TokenValidator::new(Arc::new(SystemClock), args.config.skew_buffer());
    let guard = EdgeGuard::new(Arc::new(args.config), validator);

    server::new(args.port, guard).await
}
