//! Telegram Bot MCP Gateway - Entry Point
//!
//! Runs the MCP server over stdio by default; the webhook receiver,
//! health surface, and HTTP framing start alongside when their ports
//! are configured.

use std::sync::Arc;
use telegram_bot_mcp::{health, webhook, Config, McpServer, Pipeline, UpdateQueue};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = Config::from_env()?;

    // MCP speaks on stdout; logs go to stderr as JSON
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(&config.log_level, config.debug))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(
        config = %serde_json::to_string(&config.masked())?,
        "Telegram Bot MCP Gateway v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pipeline = Arc::new(Pipeline::from_config(&config));

    if let Some(port) = config.health_port {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            if let Err(e) = health::serve(pipeline, port).await {
                warn!("health surface stopped: {}", e);
            }
        });
    }

    if let Some(port) = config.webhook_port {
        let queue = UpdateQueue::new(config.webhook_secret.clone());
        tokio::spawn(async move {
            if let Err(e) = webhook::serve(queue, port).await {
                warn!("webhook receiver stopped: {}", e);
            }
        });
    }

    let server = Arc::new(McpServer::new(&config, pipeline));

    if let Some(port) = config.mcp_http_port {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            if let Err(e) = server.serve_http(port).await {
                warn!("MCP HTTP framing stopped: {}", e);
            }
        });
    }

    server.run().await?;
    Ok(())
}

fn log_level(name: &str, debug: bool) -> Level {
    if debug {
        return Level::DEBUG;
    }
    match name {
        "debug" => Level::DEBUG,
        "notice" | "warning" => Level::WARN,
        "error" | "critical" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn print_help() {
    println!("Telegram Bot MCP Gateway v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: telegram-bot-mcp [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --help, -h  Show this help");
    println!();
    println!("Runs as an MCP server over stdio. Side listeners start when");
    println!("their ports are configured.");
    println!();
    println!("Environment variables:");
    println!("  TELEGRAM_BOT_TOKEN       Bot token (required)");
    println!("  TELEGRAM_API_URL         Bot API origin override");
    println!("  LOG_LEVEL                debug|info|notice|warning|error|critical");
    println!("  REQUEST_TIMEOUT          Per-call timeout in ms (5000-120000)");
    println!("  MAX_RETRIES              Retry budget (0-10)");
    println!("  RATE_LIMIT_PER_MINUTE    Global outbound budget (1-60)");
    println!("  MCP_TOOL_MODE            flat|meta tool surface");
    println!("  MCP_HTTP_PORT            Enable MCP over HTTP");
    println!("  MCP_HTTP_TOKEN           Bearer token for the HTTP framing");
    println!("  WEBHOOK_PORT             Enable the inbound update receiver");
    println!("  WEBHOOK_SECRET           Shared secret for update delivery");
    println!("  HEALTH_PORT              Enable /health, /ready, /live, /metrics");
    println!("  DEBUG                    Force debug logging");
}
