use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use agentquant_core::{
    config::Config,
    http_client::{HttpClient, RequestCtx},
    model::{ChatRequestBody, UiMessage},
    normalizer::normalize_chat,
    provider::{AgentUpstream, BackendApi},
    providers::{AgentClient, BackendClient},
    proxy::{AppState, build_router},
    session::ToolLedger,
    stream::StreamEvent,
    transcoder::Transcoder,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agentquant", author, version, about = "AgentQuant streaming gateway", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway
    Serve {
        /// Path to a JSON or TOML config file
        #[arg(long, env = "AGENTQUANT_CONFIG")]
        config: Option<PathBuf>,
        /// Port to listen on (overrides config and AGENTQUANT_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Send one message to the agent and print the streamed turn
    Chat {
        #[arg(short, long, help = "Message from the user")]
        message: String,
        #[arg(long, env = "AGENTQUANT_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);
    if json {
        fmt.json().init();
    } else {
        fmt.init();
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let mut cfg = match path {
        Some(p) => Config::from_path(p)
            .with_context(|| format!("failed to load config from {}", p.display()))?,
        None => Config::default(),
    };
    cfg.apply_env()?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Serve { config, port } => {
            let mut cfg = load_config(config.as_ref())?;
            if let Some(port) = port {
                cfg.server.port = port;
            }
            serve(cfg).await
        }
        Commands::Chat { message, config } => {
            let cfg = load_config(config.as_ref())?;
            chat(cfg, message).await
        }
    }
}

async fn serve(cfg: Config) -> anyhow::Result<()> {
    let http = HttpClient::from_cfg(&cfg.http)?;
    let state = AppState {
        agent: Arc::new(AgentClient::new(http.clone(), cfg.agent.base_url.clone())),
        backend: Arc::new(BackendClient::new(http, cfg.backend.base_url.clone())),
        transcoder: Transcoder::new(cfg.stream.clone()),
    };
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", cfg.server.bind, cfg.server.port)
        .parse()
        .with_context(|| format!("invalid bind address {}", cfg.server.bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        %addr,
        agent = %cfg.agent.base_url,
        backend = %cfg.backend.base_url,
        framing = ?cfg.stream.framing,
        "agentquant listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await
        .context("server error")
}

async fn chat(cfg: Config, message: String) -> anyhow::Result<()> {
    let http = HttpClient::from_cfg(&cfg.http)?;
    let agent = AgentClient::new(http.clone(), cfg.agent.base_url.clone());
    let backend = BackendClient::new(http, cfg.backend.base_url.clone());
    let transcoder = Transcoder::new(cfg.stream.clone());

    let rid = "cli";
    let ctx = RequestCtx::with_request_id(rid);
    let req = normalize_chat(&ChatRequestBody {
        messages: vec![UiMessage::user(message)],
    });

    let upstream = agent.open_chat_stream(&req, &ctx).await?;
    let mut events = transcoder.events(upstream, rid);
    let mut ledger = ToolLedger::new();
    let mut stdout = io::stdout();
    while let Some(ev) = events.next().await {
        match &ev {
            StreamEvent::Text { text } => {
                print!("{text}");
                stdout.flush().ok();
            }
            StreamEvent::DataJson { data } => {
                eprintln!("\n[tool: {}]", data.tool_name().unwrap_or(data.name.as_str()));
            }
        }
        ledger.observe(&ev);
    }
    println!();

    if let Some(key) = ledger.storage_key() {
        let bars = backend.price_bars(key, &ctx).await?;
        let count = bars["data"].as_array().map_or(0, Vec::len);
        println!("price bars {key}: {count} rows");
    }
    if let Some(task_id) = ledger.task_id() {
        let result = backend.task_result(task_id, &ctx).await?;
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}
