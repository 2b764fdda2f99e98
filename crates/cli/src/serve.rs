//! Tool server: one JSON request per line in, one JSON response per line out
//!
//! Requests are `{"id": ..., "tool": "compare", "arguments": {...}}` and run
//! concurrently against the shared context; responses carry the request id
//! and may arrive out of order.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use figdiff_common::{Error, Result};

use crate::tools::{failure, ToolContext};

#[derive(Debug, Clone, Deserialize)]
pub struct ToolRequest {
    #[serde(default)]
    pub id: Value,
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    pub id: Value,
    pub result: Value,
}

/// Serve requests from `input` until EOF or shutdown, then drain in-flight work
pub async fn serve<R, W>(ctx: Arc<ToolContext>, input: R, output: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<ToolResponse>();
    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(response) = rx.recv().await {
            let line = serde_json::to_string(&response)?;
            output.write_all(line.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }
        output.shutdown().await?;
        Ok::<(), Error>(())
    });

    let shutdown = ctx.shutdown_token().clone();
    let mut lines = BufReader::new(input).lines();
    let mut tasks = JoinSet::new();
    info!("Serving tools on stdio");

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown requested, no longer reading requests");
                break;
            }
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<ToolRequest>(line) {
            Ok(request) => {
                debug!("Request {} -> {}", request.id, request.tool);
                let ctx = Arc::clone(&ctx);
                let tx = tx.clone();
                tasks.spawn(async move {
                    let result = ctx.call(&request.tool, request.arguments).await;
                    let _ = tx.send(ToolResponse { id: request.id, result });
                });
            }
            Err(e) => {
                let err = Error::Validation(format!("malformed request: {}", e));
                let _ = tx.send(ToolResponse {
                    id: Value::Null,
                    result: failure(&err),
                });
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!("Tool task failed: {}", e);
        }
    }
    drop(tx);
    writer.await.map_err(|e| Error::Io(std::io::Error::other(e)))??;
    Ok(())
}
