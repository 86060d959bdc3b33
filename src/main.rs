use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::net::SocketAddr;
use std::sync::Arc;

use chunkbay::config::Config;
use chunkbay::state::AppState;
use chunkbay::server::{build_router, print_startup_banner, start_server};

// use mimalloc as the global allocator
// 10-20% faster than system allocator
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    // load .env file if it exists (fails silently if not found)
    let _ = dotenvy::dotenv();

    // load configuration from environment variables
    let config = Config::from_env();

    // build tokio runtime with configured worker threads
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime");

    runtime.block_on(async {
        // initialize tracing
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .init();

        // create the uploads directory if it doesn't exist
        if !config.uploads_dir.exists() {
            std::fs::create_dir_all(&config.uploads_dir)
                .expect("Failed to create uploads directory");
            tracing::info!("Created uploads directory at: {:?}", config.uploads_dir);
        }

        // create shared state
        let state = Arc::new(AppState::new(config.uploads_dir.clone()));

        // build router
        let app = build_router(state, &config);

        // define address from config
        let addr = SocketAddr::from((
            config.host.parse::<std::net::IpAddr>()
                .expect("Invalid HOST"),
            config.port
        ));

        // print startup information
        print_startup_banner(&config);

        // start the server
        start_server(app, addr).await;
    });
}
