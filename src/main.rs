use clap::Parser;
use std::sync::Arc;
use tokio::sync::Notify;

mod cli;
mod config;
mod error;
mod handler;
mod http;
mod logger;
mod server;
mod storage;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::Args::parse();
    let cfg = config::Config::load_from(&args.config, &args.overrides())?;
    logger::init(&cfg)?;

    // Worker thread count follows server.workers, CPU cores otherwise
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
        logger::log_info(&format!("Using {workers} worker threads"));
    } else {
        logger::log_info("Using default worker threads (CPU cores)");
    }

    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;

    // Storage must exist before the first request can arrive
    let storage_dir = cfg.upload.storage_dir.clone();
    let state = config::AppState::new(cfg).await.map_err(|e| {
        format!(
            "Failed to prepare storage directory {}: {e}",
            storage_dir.display()
        )
    })?;
    let state = Arc::new(state);

    let listener = server::create_reusable_listener(addr)?;
    logger::log_server_start(&addr, &state.config, &state.image_base_url);

    let shutdown = Arc::new(Notify::new());
    server::start_signal_handler(Arc::clone(&shutdown))?;

    server::run_server(listener, state, shutdown).await?;
    logger::log_info("Server stopped");
    Ok(())
}
