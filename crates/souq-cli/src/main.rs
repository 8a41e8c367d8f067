use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

use souq_session::{ChatSession, Inbox, InboxFilter, Phase};
use souq_store::{ChatStore, SimulatedLatency, seed};
use souq_types::events::SessionEvent;
use souq_types::models::{Conversation, Message, MessageKind, UserContext};

const DEFAULT_FIXTURE: &str = include_str!("../fixtures/messages.json");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "souq=debug".into()),
        )
        .init();

    // Config
    let user_id = std::env::var("SOUQ_USER").unwrap_or_else(|_| "current-user".into());
    let min_delay: u64 = std::env::var("SOUQ_MIN_DELAY_MS")
        .unwrap_or_else(|_| "200".into())
        .parse()?;
    let max_delay: u64 = std::env::var("SOUQ_MAX_DELAY_MS")
        .unwrap_or_else(|_| "500".into())
        .parse()?;
    let fixture = match std::env::var("SOUQ_FIXTURE") {
        Ok(path) => std::fs::read_to_string(&path)?,
        Err(_) => DEFAULT_FIXTURE.to_string(),
    };

    let identity = UserContext::new(user_id);
    let transport = Arc::new(SimulatedLatency::new(
        Duration::from_millis(min_delay),
        Duration::from_millis(max_delay),
    ));
    let store = Arc::new(ChatStore::with_seed(
        transport,
        identity.clone(),
        seed::from_json(&fixture)?,
    ));

    info!(user = %identity.user_id, "souq chat started");
    repl(store, identity).await
}

async fn repl(store: Arc<ChatStore>, identity: UserContext) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut inbox = Inbox::new(store.clone());
    let mut open: Option<(ChatSession, mpsc::UnboundedReceiver<SessionEvent>)> = None;

    println!("souq chat - type `help` for commands");
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));

        match cmd {
            "" => {}
            "help" => {
                println!("  ls [unread|archived] [query]  list conversations");
                println!("  open <chat_id>                open a chat");
                println!("  send <text>                   send a message in the open chat");
                println!("  rec / stop                    start / stop a voice recording");
                println!("  read                          mark the open chat read");
                println!("  archive / unarchive <chat>    toggle the archived flag");
                println!("  rm <message_id>               delete a message");
                println!("  quit                          exit");
            }
            "ls" => {
                let (filter, query) = parse_filter(rest);
                inbox.load().await;
                match inbox.phase() {
                    Phase::Failed(reason) => println!("load failed: {reason} (try `ls` again)"),
                    _ => {
                        let visible = inbox.visible(query, filter);
                        if visible.is_empty() {
                            println!("no conversations");
                        }
                        for conv in visible {
                            println!("{}", render_conversation(conv));
                        }
                    }
                }
            }
            "open" => {
                if rest.is_empty() {
                    println!("usage: open <chat_id>");
                } else {
                    let (mut session, mut rx) =
                        ChatSession::open(store.clone(), rest, identity.clone());
                    session.load_history().await;
                    match session.phase() {
                        Phase::Failed(reason) => {
                            println!("load failed: {reason} (open again to retry)")
                        }
                        _ => {
                            for m in session.history() {
                                println!("{}", render_message(m, &identity));
                            }
                            println!("-- {} open --", session.chat_id());
                        }
                    }
                    // The full history was just printed; the queued
                    // history-changed event is of no use to the prompt.
                    while rx.try_recv().is_ok() {}
                    open = Some((session, rx));
                }
            }
            "send" => {
                if let Some((session, rx)) = open.as_mut() {
                    session.set_input(rest);
                    session.submit().await;
                    drain_events(rx, session, &identity);
                } else {
                    println!("no open chat; `open <chat_id>` first");
                }
            }
            "rec" => {
                if let Some((session, rx)) = open.as_mut() {
                    session.start_recording();
                    drain_events(rx, session, &identity);
                } else {
                    println!("no open chat; `open <chat_id>` first");
                }
            }
            "stop" => {
                if let Some((session, rx)) = open.as_mut() {
                    session.stop_recording().await;
                    drain_events(rx, session, &identity);
                } else {
                    println!("no open chat; `open <chat_id>` first");
                }
            }
            "read" => {
                if let Some((session, _)) = open.as_ref() {
                    match store.mark_read(session.chat_id()).await {
                        Ok(conv) => println!("marked read: {}", conv.chat_id),
                        Err(e) => println!("{e}"),
                    }
                } else {
                    println!("no open chat; `open <chat_id>` first");
                }
            }
            "archive" | "unarchive" => {
                if rest.is_empty() {
                    println!("usage: {cmd} <chat_id>");
                } else {
                    match store.set_archived(rest, cmd == "archive").await {
                        Ok(conv) => println!("{}: archived={}", conv.chat_id, conv.archived),
                        Err(e) => println!("{e}"),
                    }
                }
            }
            "rm" => match rest.parse::<u64>() {
                Ok(id) => match store.remove(id).await {
                    Ok(m) => println!("deleted message {} ({:?})", m.id, m.content),
                    Err(e) => println!("{e}"),
                },
                Err(_) => println!("usage: rm <message_id>"),
            },
            "quit" | "exit" => break,
            other => println!("unknown command `{other}`; try `help`"),
        }

        prompt()?;
    }

    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("> ");
    std::io::stdout().flush()
}

fn parse_filter(rest: &str) -> (InboxFilter, &str) {
    let (first, tail) = rest.split_once(' ').unwrap_or((rest, ""));
    match first {
        "unread" => (InboxFilter::Unread, tail),
        "archived" => (InboxFilter::Archived, tail),
        _ => (InboxFilter::All, rest),
    }
}

/// Print queued session events the way a toast collaborator would.
fn drain_events(
    rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
    session: &ChatSession,
    identity: &UserContext,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            SessionEvent::HistoryChanged { .. } => {
                // Auto-scroll stand-in: show the newest entry.
                if let Some(last) = session.history().last() {
                    println!("{}", render_message(last, identity));
                }
            }
            SessionEvent::SendFailed { reason } => println!("! send failed: {reason}"),
            SessionEvent::RecordingStarted => println!("* recording... `stop` to send"),
            SessionEvent::VoiceMessageSent { seconds } => {
                println!("* voice message sent ({seconds}s)")
            }
        }
    }
}

fn render_message(m: &Message, identity: &UserContext) -> String {
    let who = if m.sender_id == identity.user_id {
        "me"
    } else {
        m.sender_id.as_str()
    };
    let tag = match m.kind {
        MessageKind::Text => "",
        MessageKind::Audio => "[audio] ",
        MessageKind::Image => "[image] ",
    };
    format!("  {} {who}: {tag}{}", m.timestamp.format("%m-%d %H:%M"), m.content)
}

fn render_conversation(c: &Conversation) -> String {
    let preview = c
        .last_message
        .as_ref()
        .map(|m| m.content.as_str())
        .unwrap_or("(no messages)");
    let unread = if c.unread_count > 0 {
        format!(" ({} unread)", c.unread_count)
    } else {
        String::new()
    };
    let archived = if c.archived { " [archived]" } else { "" };
    format!("  {}{unread}{archived}: {preview}", c.chat_id)
}
