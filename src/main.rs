use clap::Parser;
use course_runner::{
    build_router,
    cli::{login_once, tail_log, Cli, Commands},
    config::ServerConfig,
    logs::LOG_FILE_NAME,
    portal::HttpPortal,
    state::AppContext,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = ServerConfig::from_env()?;

    // `logs` only reads what the last server run left behind
    if let Some(Commands::Logs { limit }) = &cli.command {
        for line in tail_log(&config.log_file_path(), *limit).await? {
            println!("{}", line);
        }
        return Ok(());
    }

    let _log_guard = init_tracing(&config)?;

    let portal = HttpPortal::new(
        config.portal_base_url.clone(),
        Duration::from_secs(config.portal_timeout_seconds),
    )?;
    let ctx = Arc::new(AppContext::new(config.clone(), Arc::new(portal)));

    if let Some(Commands::Login { cookies }) = &cli.command {
        return login_once(&ctx, cookies).await;
    }

    // Server mode
    info!("🚀 Starting Course Runner v{}", VERSION);
    info!("📋 Configuration loaded:");
    info!("   Port: {}", config.port);
    info!("   Bind address: {}", config.bind_addr);
    info!("   Portal: {}", config.portal_base_url);
    info!("   Session file: {:?}", config.session_config_path);
    info!("   Log file: {:?}", config.log_file_path());
    info!("   CORS origins: {:?}", config.cors_origins);
    ctx.logs.system(format!("Course Runner v{} starting", VERSION));

    if ctx.auto_login().await {
        info!("✅ Restored saved session");
    } else {
        info!("🔑 No valid session, waiting for POST /api/login");
    }

    let app = build_router(ctx.clone());

    // Start server
    let addr: SocketAddr = config.bind_address().parse()?;
    info!("🎧 Listening on http://{}", addr);
    info!("🔑 Health endpoint: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown({
        let ctx = ctx.clone();
        async move {
            shutdown_signal().await;
            ctx.begin_shutdown().await;
        }
    })
    .await?;

    ctx.logs.system("server stopped");

    Ok(())
}

/// Console plus `latest.log`, appended to across runs
fn init_tracing(config: &ServerConfig) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(&config.log_directory)?;
    let file_appender = tracing_appender::rolling::never(&config.log_directory, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "course_runner=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
