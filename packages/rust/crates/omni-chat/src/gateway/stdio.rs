//! Stdio gateway: read line from stdin → run conversation turn → print reply.

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::conversation::ConversationService;

/// Default session ID when not overridden by flag.
pub const DEFAULT_STDIO_SESSION_ID: &str = "default";

/// Run stdio loop: read lines, run turn, print reply. Exits on EOF.
pub async fn run_stdio(service: ConversationService, session_id: String) -> Result<()> {
    serve_lines(
        &service,
        &session_id,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        tokio::io::stderr(),
    )
    .await
}

/// One conversation turn per non-blank input line, all under `session_id`.
///
/// Replies go to `output`; failures are written to `errors` as `error: ...` and the loop
/// continues, so resending the same line retries the pending turn. Returns on EOF.
pub async fn serve_lines<R, W, E>(
    service: &ConversationService,
    session_id: &str,
    input: R,
    mut output: W,
    mut errors: E,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match service.handle_message(session_id, &line).await {
            Ok(reply) => {
                output.write_all(reply.as_bytes()).await?;
                output.write_all(b"\n").await?;
                output.flush().await?;
            }
            Err(error) => {
                errors.write_all(format!("error: {error}\n").as_bytes()).await?;
                errors.flush().await?;
            }
        }
    }
    Ok(())
}
