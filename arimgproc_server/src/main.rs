// HTTP entry for arimgproc
use anyhow::{Context, Result};
use arimgproc_server::{router, AppState, ImageContext};
use clap::Parser;
use log::info;
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(name = "arimgproc-server", version, about = "Serve processed renditions of one image over HTTP")]
struct ServerArgs {
    /// Image every route processes
    #[arg(long = "image", env = "ARIMG_IMAGE", default_value = "images/sample.png")]
    image: String,
    /// Address to bind
    #[arg(long = "host", env = "ARIMG_HOST", default_value = "127.0.0.1")]
    host: String,
    /// Port to listen on
    #[arg(long = "port", env = "PORT", default_value_t = 8080)]
    port: u16,
    /// Worker threads per clustering run
    #[arg(long = "threads")]
    threads: Option<usize>,
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = ServerArgs::parse();

    let context = ImageContext::load(&args.image).with_context(|| format!("loading {}", args.image))?;
    let threads = args.threads.unwrap_or_else(num_cpus::get);
    let state = AppState::new(context, threads);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", args.host, args.port))?;
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    info!("Listening on {} ({} clustering workers)", addr, threads.max(1));

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
