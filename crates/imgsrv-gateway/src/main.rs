use clap::Parser;
use imgsrv_core::config::ImgsrvConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

mod demo;

#[derive(Parser)]
#[command(author, version, about = "Push a heat-diffusion run to browser viewers", long_about = None)]
struct Cli {
    /// Config file (falls back to IMGSRV_CONFIG, then ~/.imgsrv/imgsrv.toml)
    #[arg(long)]
    config: Option<String>,

    /// Number of frames to publish, the last one included
    #[arg(long, default_value_t = 50)]
    frames: usize,

    #[arg(long, default_value_t = 64)]
    width: u32,

    #[arg(long, default_value_t = 64)]
    height: u32,

    /// Pause between steps
    #[arg(long, default_value_t = 100)]
    interval_ms: u64,

    /// Write the final frame to this PNG file
    #[arg(long)]
    print: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "imgsrv_gateway=info,imgsrv_publisher=info,tower_http=debug".into()
            }),
        )
        .init();

    // load config: --config > IMGSRV_CONFIG env > ~/.imgsrv/imgsrv.toml
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("IMGSRV_CONFIG").ok());
    let config = ImgsrvConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        ImgsrvConfig::default()
    });

    let (session, server) = match imgsrv_gateway::start(config).await {
        Ok(started) => started,
        Err(e) if e.is_fatal() => {
            error!(code = e.code(), "cannot start server: {e}");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };
    info!(url = %server.url(), "open the page to start the simulation");

    let producer = session.blocking();
    let opts = demo::DemoOptions {
        frames: cli.frames,
        width: cli.width,
        height: cli.height,
        interval: Duration::from_millis(cli.interval_ms),
    };
    tokio::task::spawn_blocking(move || demo::run(&producer, &opts)).await??;
    session.wait().await;

    if let Some(path) = &cli.print {
        session.print(path).await?;
        info!(path = %path.display(), "final frame written");
    }

    server.shutdown();
    server.join().await?;
    info!("imgsrv stopped");
    Ok(())
}
