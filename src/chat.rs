use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use wayfarer_agent::{GraphEngine, TurnInput, TurnRequest};
use wayfarer_core::error::WayfarerError;
use wayfarer_core::event::{DataItemKind, EventSink, TurnEvent};
use wayfarer_core::types::ThreadId;

/// Terminal conversation loop over the same engine the gateway serves.
///
/// A thread without checkpoints is started fresh; otherwise each line read
/// from stdin resumes it.
pub async fn run_chat(engine: &Arc<GraphEngine>, thread: Option<ThreadId>) -> anyhow::Result<()> {
    let thread_id = thread.unwrap_or_default();
    let store = engine.context().store.clone();

    println!("Wayfarer v{}", env!("CARGO_PKG_VERSION"));
    println!("Thread: {}", thread_id);
    println!("Type /quit to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        let input = if store.load_latest(&thread_id).await?.is_none() {
            TurnInput::Start
        } else {
            print!("> ");
            stdout.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break; // EOF
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if matches!(line, "/quit" | "/exit" | "/q") {
                println!("Safe travels!");
                break;
            }
            TurnInput::Resume(line.to_string())
        };

        let (sink, rx) = EventSink::channel();
        let printer = tokio::spawn(print_events(rx));
        let cancel = CancellationToken::new();

        let starting = input == TurnInput::Start;
        let request = TurnRequest {
            thread_id: thread_id.clone(),
            input,
        };
        // Ctrl-C abandons the turn without touching the thread.
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };
        let result = match engine.begin(request).await {
            Ok(turn) => turn.run(sink, cancel).await,
            Err(e) => {
                drop(sink);
                eprintln!("[error] {}", e);
                Err(e)
            }
        };
        watcher.abort();
        printer.await.ok();

        match result {
            Ok(_) => println!(),
            Err(WayfarerError::Cancelled) => println!("\n[cancelled]"),
            // Failures during the turn were shown by the event printer.
            Err(_) => {}
        }
        if starting && store.load_latest(&thread_id).await?.is_none() {
            // Nothing to resume; retrying would only repeat the failure.
            break;
        }
    }

    Ok(())
}

async fn print_events(mut rx: UnboundedReceiver<TurnEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            TurnEvent::TextDelta { text, .. } => {
                print!("{}", text);
                io::stdout().flush().ok();
            }
            TurnEvent::Data(item) => match item.kind {
                DataItemKind::TransferToHotel
                | DataItemKind::TransferToTravel
                | DataItemKind::TransferToWeather
                | DataItemKind::TransferToSights => {
                    let to = item.data.get("to").and_then(|v| v.as_str()).unwrap_or("?");
                    eprintln!("\n[handing over to {}]", to);
                }
                kind => {
                    let body = item.data.to_string();
                    eprintln!("\n[{}] {}", kind.as_str(), truncate(&body, 300));
                }
            },
            TurnEvent::ToolDropped { tool, reason } => {
                eprintln!("\n[skipped {}: {}]", tool, reason);
            }
            TurnEvent::TurnFailed { error } => {
                eprintln!("\n[error] {}", error);
            }
            TurnEvent::TurnStarted { .. }
            | TurnEvent::NodeEntered { .. }
            | TurnEvent::Suspended { .. } => {}
        }
    }
}

pub fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
