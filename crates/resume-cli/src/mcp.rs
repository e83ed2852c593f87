//! MCP Server over stdio
//!
//! Newline-delimited JSON-RPC on stdin/stdout. Diagnostics go to stderr so
//! stdout only ever carries protocol messages.

use std::sync::Arc;

use resume_gateway::McpServer;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Serve on the process's stdin/stdout until EOF
pub async fn run_server(server: McpServer) -> anyhow::Result<()> {
    tracing::info!("MCP stdio server ready");
    serve(
        Arc::new(server),
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;
    tracing::info!("stdin closed, MCP server exiting");
    Ok(())
}

/// Answer each request line on `reader` with one response line on `writer`
pub async fn serve<R, W>(server: Arc<McpServer>, mut reader: R, mut writer: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let message = line.trim();
        if message.is_empty() {
            continue;
        }

        let handler = server.clone();
        let owned = message.to_string();
        let response = tokio::task::spawn_blocking(move || handler.handle_message(&owned)).await?;

        if let Some(response) = response {
            let response_json = serde_json::to_string(&response)? + "\n";
            writer.write_all(response_json.as_bytes()).await?;
            writer.flush().await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use resume_core::{ApiKeyGuard, Database, ResumeService};
    use resume_gateway::ServerInfo;
    use serde_json::Value;

    #[tokio::test]
    async fn test_stdio_session() {
        let service = ResumeService::new(Database::open_in_memory().unwrap(), ApiKeyGuard::new(Some("k")));
        let server = Arc::new(McpServer::new(service, ServerInfo::default()));

        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#, "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, "\n",
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"patch_resume","arguments":{"partialResume":{"name":"Ada"},"apiKey":"k"}}}"#, "\n",
            "garbage\n",
        );
        let mut output = Vec::new();
        serve(server.clone(), input.as_bytes(), &mut output).await.unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3, "notifications and blank lines get no reply");
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[1]["id"], 2);
        assert!(lines[1]["result"]["isError"].is_null());
        assert_eq!(lines[2]["error"]["code"], -32700);

        assert_eq!(server.service().get_resume().unwrap()["name"], "Ada");
    }
}
