//! Lead Chat - terminal front end for the chat widget
//!
//! Reads commands from stdin and prints widget events as they arrive.

use lead_chat::config::WidgetConfig;
use lead_chat::conversation::Origin;
use lead_chat::db::{KeyValueStore, MemoryStore, SqliteStore};
use lead_chat::reply::{LoggingService, WebhookService};
use lead_chat::reply::ReplyService;
use lead_chat::runtime::{mount, Snapshot, WidgetEvent, WidgetHandle};
use lead_chat::session::SessionStore;
use lead_chat::state_machine::{MenuItem, Screen, HELP_TOPICS, QUICK_ACTION};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
Commands:
  /open              open the widget
  /home              go to the intro screen
  /messages          go to the chat (or the lead form)
  /book              go to the appointment screen
  /topic N           pick a help topic (0 is the quick action)
  /lead NAME, EMAIL  submit the lead form
  /show              print the current state
  /reset             end the session and start a new one
  /quit              exit
Anything else is sent as a chat message.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lead_chat=info".into());
    let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    if WidgetConfig::log_json_from_env() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt.json().with_current_span(false).with_span_list(false))
            .init();
    } else {
        tracing_subscriber::registry().with(filter).with(fmt).init();
    }

    let config = WidgetConfig::from_env();

    let kv: Arc<dyn KeyValueStore> = match &config.db_path {
        Some(db_path) => {
            // Ensure database directory exists
            if let Some(parent) = PathBuf::from(db_path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            tracing::info!(path = %db_path, "Opening session store");
            Arc::new(SqliteStore::open(db_path)?)
        }
        None => {
            tracing::warn!("No session store path configured, state will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let webhook = WebhookService::new(&config.endpoint)?;
    tracing::info!(endpoint = %config.endpoint, "Reply service configured");
    let service: Arc<dyn ReplyService> = Arc::new(LoggingService::new(Arc::new(webhook)));

    let mut handle = mount(&config, kv.clone(), service.clone());
    let mut printer = tokio::spawn(print_events(handle.subscribe()));

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match run_command(&handle, line.trim()).await? {
            Flow::Continue => {}
            Flow::Quit => break,
            Flow::Reset => {
                handle.shutdown();
                handle.stopped().await;
                printer.abort();

                SessionStore::new(kv.clone()).clear()?;
                tracing::info!("Session cleared");

                handle = mount(&config, kv.clone(), service.clone());
                printer = tokio::spawn(print_events(handle.subscribe()));
                handle.open().await?;
            }
        }
    }

    handle.shutdown();
    printer.abort();
    Ok(())
}

enum Flow {
    Continue,
    Reset,
    Quit,
}

async fn run_command(
    handle: &WidgetHandle,
    line: &str,
) -> Result<Flow, Box<dyn std::error::Error>> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    match command {
        "/quit" => return Ok(Flow::Quit),
        "/reset" => return Ok(Flow::Reset),
        "/help" => println!("{HELP}"),
        "/open" => handle.open().await?,
        "/home" => handle.navigate(MenuItem::Home).await?,
        "/messages" => handle.navigate(MenuItem::Messages).await?,
        "/book" => handle.navigate(MenuItem::BookMeeting).await?,
        "/topic" => match topic(rest.trim()) {
            Some(topic) => handle.select_topic(topic).await?,
            None => println!("Unknown topic; /show lists them"),
        },
        "/lead" => {
            let (name, email) = rest.split_once(',').unwrap_or((rest, ""));
            handle.submit_lead(name, email).await?;
        }
        "/show" => print_snapshot(&handle.snapshot().await?),
        _ => handle.submit(line).await?,
    }
    Ok(Flow::Continue)
}

fn topic(index: &str) -> Option<&'static str> {
    match index.parse::<usize>().ok()? {
        0 => Some(QUICK_ACTION),
        n => HELP_TOPICS.get(n - 1).copied(),
    }
}

fn print_snapshot(snapshot: &Snapshot) {
    println!("-- {} [{}] {}", snapshot.greeting, snapshot.screen.as_str(), snapshot.session_id);
    if snapshot.screen == Screen::Intro {
        println!("  0. {QUICK_ACTION}");
        for (i, topic) in HELP_TOPICS.iter().enumerate() {
            println!("  {}. {topic}", i + 1);
        }
    }
    for message in &snapshot.messages {
        print_message(message.origin, &message.text);
    }
    if let Some(label) = &snapshot.typing {
        println!("  ({label})");
    }
    if snapshot.queued > 0 {
        println!("  ({} queued)", snapshot.queued);
    }
}

fn print_message(origin: Origin, text: &str) {
    match origin {
        Origin::User => println!("you > {text}"),
        Origin::Bot => println!("bot > {text}"),
    }
}

async fn print_events(events: tokio::sync::broadcast::Receiver<WidgetEvent>) {
    let mut stream = BroadcastStream::new(events);
    while let Some(event) = stream.next().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Event printer fell behind");
                continue;
            }
        };
        match event {
            WidgetEvent::MessageAppended { message } => print_message(message.origin, &message.text),
            WidgetEvent::Typing { active: true, label } => println!("  ({label})"),
            WidgetEvent::Typing { active: false, .. } | WidgetEvent::ExchangeFinished { .. } => {}
            WidgetEvent::ScreenChanged { screen } => println!("-- [{}]", screen.as_str()),
            WidgetEvent::ValidationFailed { message } | WidgetEvent::Rejected { message } => {
                println!("!! {message}");
            }
            // Already in the transcript as a generic notice
            WidgetEvent::ExchangeFailed { .. } => {}
        }
    }
}
