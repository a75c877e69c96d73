use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use aligna_client::{ChatConfig, ChatSession, ChatUpdate, Direction};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aligna_client=info".into()),
        )
        .init();

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> aligna_client::Result<()> {
    let config = ChatConfig::from_env()?;
    let mut session = ChatSession::start(&config).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    info!("Type a message and press enter; Ctrl-D to quit");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                session.input_changed();
                if let Some(msg) = session.send_message(&line)? {
                    println!("[you] {} ({})", msg.text, msg.id);
                }
            }
            update = session.next_update() => {
                let Some(update) = update else {
                    info!("Connection closed by server");
                    break;
                };
                print_update(&session, update)?;
            }
        }
    }

    session.close().await;
    Ok(())
}

fn print_update(session: &ChatSession, update: ChatUpdate) -> aligna_client::Result<()> {
    match update {
        ChatUpdate::MessageAdded(msg) => {
            let who = match session.conversation().direction(&msg) {
                Direction::Sent => "you",
                Direction::Received => "agent",
            };
            println!("[{}] {}", who, msg.text);
            if session.conversation().direction(&msg) == Direction::Received {
                session.mark_read(&msg.id)?;
            }
        }
        ChatUpdate::MessageConfirmed(msg) => println!("  delivered as {}", msg.id),
        ChatUpdate::StatusChanged { message_id, status } => {
            println!("  {} is now {}", message_id, status.as_str())
        }
        ChatUpdate::HistoryLoaded(count) => {
            println!("-- {} earlier messages --", count);
            for msg in session.conversation().messages() {
                println!("  {}: {}", msg.sender_id, msg.text);
            }
        }
        ChatUpdate::AgentTyping(true) => println!("  agent is typing..."),
        ChatUpdate::AgentTyping(false) => {}
        ChatUpdate::ServerError(message) => println!("  server error: {}", message),
    }
    Ok(())
}
