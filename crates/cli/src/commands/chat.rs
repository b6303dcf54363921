use std::io;

use partsline_agent::{Conversation, Router};
use partsline_core::config::LoadOptions;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::info;

use super::{prepare, startup_failure, CommandResult};

const BANNER: &str = "Parts assistant. Ask about orders, refunds, subscriptions or parts.\n\
Try:\n  \
Check order status for order W174191 with zip 20020\n  \
What's the refund status for order E001861?\n  \
Is part 1366 compatible with model 3352573?\n  \
Look up my subscription, phone 512-709-1519\n\
Type quit, exit or q to leave.";

const SEPARATOR: &str = "----------------------------------------";

pub async fn run(options: LoadOptions) -> CommandResult {
    let (config, router) = match prepare(options) {
        Ok(prepared) => prepared,
        Err(error) => return startup_failure("chat", &error),
    };

    let input = BufReader::new(tokio::io::stdin());
    let output = tokio::io::stdout();
    match session(&router, config.conversation.history_limit, input, output).await {
        Ok(_) => CommandResult::text(0, ""),
        Err(error) => CommandResult::failure("chat", "io", error.to_string(), 1),
    }
}

/// Runs the read-route-print loop until end of input or a quit command.
/// Returns the number of routed rounds.
pub async fn session<R, W>(
    router: &Router,
    history_limit: usize,
    input: R,
    mut output: W,
) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut conversation = Conversation::new(history_limit);
    let mut lines = input.lines();
    let mut rounds = 0;

    info!(
        event_name = "chat.session.started",
        session_id = %conversation.id(),
        "chat session started"
    );
    output.write_all(format!("{BANNER}\n").as_bytes()).await?;

    loop {
        output.write_all(b"\n> ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query.to_ascii_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }

        let turn = conversation.ask(router, query).await;
        rounds += 1;
        output.write_all(format!("{SEPARATOR}\n{}\n{SEPARATOR}\n", turn.reply).as_bytes()).await?;
    }

    output.write_all(b"\nGoodbye.\n").await?;
    output.flush().await?;
    info!(
        event_name = "chat.session.ended",
        session_id = %conversation.id(),
        rounds,
        "chat session ended"
    );
    Ok(rounds)
}
