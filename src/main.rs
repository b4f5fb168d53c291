use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use url::Url;

use mcp_bridge::{
    config::{BridgeConfig, FeatureFlags},
    dispatch::Dispatcher,
    gateway::{Forward, HttpGateway},
    registry::SearchService,
    transport, BuiltinToolset,
};

#[derive(Parser, Debug)]
#[command(
    name = "mcp-bridge",
    version,
    about = "Stdio MCP adapter bridging clients to a local tool backend"
)]
struct Cli {
    /// Backend JSON-RPC endpoint.
    #[arg(
        long,
        env = "MCP_BRIDGE_BACKEND_URL",
        default_value = "http://127.0.0.1:9090/rpc"
    )]
    backend_url: Url,

    /// Do not advertise or dispatch the configure builtin.
    #[arg(long, env = "MCP_BRIDGE_DISABLE_CONFIGURE_TOOL")]
    disable_configure_tool: bool,

    /// Do not apply the single-parameter required-schema compatibility patch.
    #[arg(long, env = "MCP_BRIDGE_DISABLE_SCHEMA_COMPAT")]
    disable_schema_compat: bool,

    /// Default log level (overridden by RUST_LOG).
    #[arg(long, env = "MCP_BRIDGE_LOG", default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    // Stdout is protocol-reserved; all diagnostics go to stderr.
    let directive = level.parse().unwrap_or_else(|_| LevelFilter::INFO.into());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(
            EnvFilter::builder()
                .with_default_directive(directive)
                .from_env_lossy(),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = BridgeConfig {
        backend_url: cli.backend_url,
        features: FeatureFlags {
            configure_tool: !cli.disable_configure_tool,
            schema_compat: !cli.disable_schema_compat,
        },
    };

    let gateway: Arc<dyn Forward> = Arc::new(HttpGateway::new(config.backend_url.clone())?);
    let search = Arc::new(SearchService::new());
    let builtins = BuiltinToolset::new(search.clone(), gateway.clone(), config.features);
    let dispatcher = Arc::new(Dispatcher::new(gateway, builtins, search, config.features));

    // The snapshot loads in the background; pass-through serving starts
    // immediately and the builtins come online once the index is installed.
    let init = dispatcher.clone();
    tokio::spawn(async move { init.initialize_backend().await });

    info!(backend = %config.backend_url, "mcp-bridge serving on stdio");
    transport::serve(dispatcher, tokio::io::stdin(), tokio::io::stdout()).await?;
    Ok(())
}
