mod chat;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use wayfarer_agent::{GraphContext, GraphEngine};
use wayfarer_core::config::{AppConfig, ModelConfig, TavilyConfig, TripAdvisorConfig};
use wayfarer_core::traits::CheckpointStore;
use wayfarer_core::types::{MessageContent, ThreadId};
use wayfarer_tools::ToolRegistry;

#[derive(Parser)]
#[command(name = "wayfarer", version, about = "Multi-advisor travel planning assistant")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "wayfarer.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Override the bind address from config
        #[arg(long)]
        bind: Option<String>,
    },
    /// Talk to the advisors in the terminal
    Chat {
        /// Resume (or start) this thread instead of a new one
        #[arg(short, long)]
        thread: Option<String>,
    },
    /// List threads, or show one thread's checkpoint history
    History {
        thread: Option<String>,
        /// Maximum threads to list
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("wayfarer=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "wayfarer", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;

    if let Some(Commands::Config) = &cli.command {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let store = wayfarer_store::open_store(&config.store)?;

    match cli.command {
        Some(Commands::History { thread, limit }) => {
            print_history(store.as_ref(), thread, limit).await?;
        }
        Some(Commands::Serve { bind }) => {
            let engine = build_engine(&config, store)?;
            let mut gateway_config = config.gateway.clone().unwrap_or_default();
            if let Some(bind) = bind {
                gateway_config.bind = bind;
            }
            info!(bind = %gateway_config.bind, "Starting gateway");
            let server = wayfarer_gateway::GatewayServer::new(gateway_config, engine);
            let cancel = tokio_util::sync::CancellationToken::new();
            let cancel_clone = cancel.clone();

            // Graceful shutdown on Ctrl-C
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down gateway...");
                cancel_clone.cancel();
            });

            server.run(cancel).await?;
        }
        Some(Commands::Chat { thread }) => {
            let engine = build_engine(&config, store)?;
            chat::run_chat(&engine, thread.map(|t| ThreadId::from_string(&t))).await?;
        }
        None => {
            let engine = build_engine(&config, store)?;
            chat::run_chat(&engine, None).await?;
        }
        // Both handled above.
        Some(Commands::Config) | Some(Commands::Completions { .. }) => {}
    }

    Ok(())
}

fn load_config(path: &PathBuf) -> anyhow::Result<AppConfig> {
    if path.exists() {
        return Ok(AppConfig::load(path)?);
    }
    // Check for config in the home directory
    if let Some(home) = dirs_home().map(|h| h.join(".wayfarer").join("config.toml")) {
        if home.exists() {
            info!(path = %home.display(), "Loading config from home directory");
            return Ok(AppConfig::load(&home)?);
        }
    }
    eprintln!("Warning: No config file found. Set OPENAI_API_KEY or create wayfarer.toml");
    create_env_config()
}

/// Wire the model client, tools and store into a graph engine.
fn build_engine(
    config: &AppConfig,
    store: Arc<dyn CheckpointStore>,
) -> anyhow::Result<Arc<GraphEngine>> {
    let llm = wayfarer_llm::build_client(config);
    let tools = ToolRegistry::from_config(&config.tools);
    info!(tools = tools.list().len(), model = %config.model.model_id, "Tools registered");

    let ctx = GraphContext {
        llm,
        model: config.model.clone(),
        tools: Arc::new(tools),
        store,
        graph: config.graph.clone(),
    };
    Ok(Arc::new(GraphEngine::from_config(config, ctx)?))
}

async fn print_history(
    store: &dyn CheckpointStore,
    thread: Option<String>,
    limit: usize,
) -> anyhow::Result<()> {
    let Some(thread) = thread else {
        let threads = store.list_threads(limit).await?;
        if threads.is_empty() {
            println!("No threads yet.");
        }
        for id in threads {
            println!("{}", id);
        }
        return Ok(());
    };

    let thread_id = ThreadId::from_string(&thread);
    let history = store.history(&thread_id).await?;
    let Some(latest) = history.last() else {
        anyhow::bail!("thread {} has no checkpoints", thread_id);
    };

    for cp in &history {
        println!(
            "#{:<4} parent={:<6} {}  {} messages, with {}",
            cp.seq,
            cp.parent_seq.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
            cp.created_at.format("%Y-%m-%d %H:%M:%S"),
            cp.state.messages.len(),
            cp.state
                .active_sender
                .map(|a| a.as_str())
                .unwrap_or("nobody"),
        );
    }

    println!();
    for msg in &latest.state.messages {
        let who = msg.sender_name.as_deref().unwrap_or(msg.role.as_str());
        let text = match &msg.content {
            MessageContent::Text { text } => text.clone(),
            MessageContent::Data { data } => data
                .get("tool")
                .and_then(|t| t.as_str())
                .map(|t| format!("<{} result>", t))
                .unwrap_or_else(|| data.to_string()),
        };
        println!("[{}] {}", who, chat::truncate(&text, 200));
    }
    Ok(())
}

fn create_env_config() -> anyhow::Result<AppConfig> {
    let openai_key = std::env::var("OPENAI_API_KEY").ok();

    let (model_id, base_url) = if openai_key.is_some() {
        ("gpt-4o".to_string(), None)
    } else {
        // Default to a local OpenAI-compatible server (Ollama)
        (
            "llama3.2".to_string(),
            Some("http://localhost:11434/v1/chat/completions".to_string()),
        )
    };

    let model = ModelConfig {
        provider: "openai".to_string(),
        model_id,
        api_key: openai_key,
        base_url,
        max_tokens: 4096,
        temperature: 0.0,
        retry: None,
        extra_headers: Default::default(),
    };

    let mut tools = wayfarer_core::config::ToolsConfig::default();
    if let Ok(api_key) = std::env::var("TRIPADVISOR_API_KEY") {
        tools.tripadvisor = Some(TripAdvisorConfig {
            api_key,
            base_url: "https://api.content.tripadvisor.com/api/v1".to_string(),
            radius_unit: "km".to_string(),
        });
    }
    if let Ok(api_key) = std::env::var("TAVILY_API_KEY") {
        tools.tavily = Some(TavilyConfig {
            api_key,
            base_url: "https://api.tavily.com".to_string(),
            max_results: 5,
        });
    }

    Ok(AppConfig {
        model,
        fallback_models: vec![],
        graph: Default::default(),
        store: Default::default(),
        gateway: None,
        tools,
        advisors: HashMap::new(),
    })
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
