//! Serve Command

use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use crate::tools::ToolContext;

/// Serve tools on stdin/stdout until EOF or ctrl-c, then tear the browser down
pub async fn execute(ctx: ToolContext) -> Result<()> {
    let ctx = Arc::new(ctx);
    let token = ctx.shutdown_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let served = crate::serve(Arc::clone(&ctx), tokio::io::stdin(), tokio::io::stdout()).await;
    match Arc::try_unwrap(ctx) {
        Ok(ctx) => ctx.shutdown().await,
        Err(_) => warn!("Tool context still shared at exit"),
    }
    served?;
    Ok(())
}
