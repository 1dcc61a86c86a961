use decision_chat::channels::{CliChannel, CliExit};
use decision_chat::config::ChatConfig;
use decision_chat::conversation::{SessionRegistry, spawn_expiry_task};
use decision_chat::error::Result;
use decision_chat::server::chat_routes;
use decision_chat::tree::{load_tree, source_for};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ChatConfig::from_env()?;

    eprintln!("🤖 Decision Chat v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Data: {}", config.data_source);
    eprintln!("   Entry point: {}", config.entry_point);
    eprintln!("   Chat WS: ws://0.0.0.0:{}/ws", config.port);
    eprintln!("   Sessions API: http://0.0.0.0:{}/api/sessions", config.port);

    // ── Decision Tree ───────────────────────────────────────────────────
    // One shot: on failure every conversation shows the load-error entry.
    let source = source_for(&config.data_source);
    let tree = match load_tree(source.as_ref(), &config.entry_point).await {
        Ok(tree) => {
            eprintln!("   States: {}", tree.len());
            Some(tree)
        }
        Err(e) => {
            tracing::error!(error = %e, "Error loading chatbot data");
            eprintln!("   Warning: decision tree unavailable: {}", e);
            None
        }
    };

    let registry = SessionRegistry::new(tree, &config);
    let _expiry = spawn_expiry_task(std::sync::Arc::clone(&registry));

    // ── Server ──────────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Chat server started");
    let app = chat_routes(std::sync::Arc::clone(&registry));
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    // ── CLI ─────────────────────────────────────────────────────────────
    // Only an explicit /quit stops the process; closed stdin just ends the CLI.
    if config.cli_enabled {
        eprintln!("   CLI: enabled\n");
        match CliChannel::new(registry.detached()).run().await {
            CliExit::Quit => {
                server.abort();
                return Ok(());
            }
            CliExit::InputClosed => {
                tracing::info!("CLI input closed, server keeps running");
            }
        }
    } else {
        eprintln!("   CLI: disabled\n");
    }

    server.await??;
    Ok(())
}
