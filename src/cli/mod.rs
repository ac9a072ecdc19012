use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use std::{path::PathBuf, sync::Arc};

use crate::{
    catalog::{Catalog, spotify::SpotifyCatalog},
    client::ServerConnection,
    config::Config,
    domain::track::Track,
    recommend::{ArtistTopTracks, RecommendationEngine},
    server::Server,
};

#[derive(Parser)]
#[command(name = "trackline")]
#[command(version = "0.1")]
#[command(about = "Music search and recommendation server")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the TCP server until Ctrl-C or SIGTERM
    Serve,
    /// Search tracks through a running server
    Search {
        query: String,
        /// Maximum number of tracks (1-50)
        #[arg(short, long)]
        limit: Option<u32>,
        /// Server address, defaults to the configured bind address
        #[arg(short, long)]
        server: Option<String>,
    },
    /// Recommend tracks by the same artist as a track
    Recommend {
        track_id: String,
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
        /// Ask a running server instead of querying the catalog directly
        #[arg(short, long)]
        remote: bool,
        /// Print every top track instead of stopping at --count
        #[arg(long, conflicts_with = "remote")]
        all: bool,
        /// Server address used with --remote
        #[arg(short, long)]
        server: Option<String>,
    },
    /// Check that the catalog accepts the configured client credentials
    Auth,
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;
    debug!("Loaded {} (version {})", cli.config.display(), cfg.version);

    match cli.command {
        Commands::Serve => {
            let catalog = SpotifyCatalog::from_config(&cfg.catalog)?;
            let server = Server::new(
                Arc::new(catalog),
                cfg.server,
                cfg.refresh,
                cfg.catalog.market,
            )
            .start()?;

            println!("Server listening on {}", server.local_addr());
            let waited = wait_for_shutdown_signal();
            server.shutdown();
            waited?;
        }

        Commands::Search {
            query,
            limit,
            server,
        } => {
            let addr = server.unwrap_or_else(|| cfg.server.addr());
            let mut connection = ServerConnection::connect(addr.as_str())
                .with_context(|| format!("Failed to connect to {addr}"))?;

            let tracks = connection.search_tracks(&query, limit)?;
            println!("Found {} tracks for \"{query}\":", tracks.len());
            print_tracks(&tracks);
        }

        Commands::Recommend {
            track_id,
            count,
            remote,
            all,
            server,
        } => {
            if remote {
                let addr = server.unwrap_or_else(|| cfg.server.addr());
                let mut connection = ServerConnection::connect(addr.as_str())
                    .with_context(|| format!("Failed to connect to {addr}"))?;

                let mut tracks = connection.recommend(&track_id)?;
                tracks.truncate(count);
                println!("Recommendations for {track_id}:");
                print_tracks(&tracks);
            } else {
                if server.is_some() {
                    warn!("--server is only used together with --remote");
                }
                let catalog = Arc::new(SpotifyCatalog::from_config(&cfg.catalog)?);
                catalog.authenticate()?;

                let seed = catalog.get_track_by_id(&track_id)?;
                let engine = RecommendationEngine::new(Box::new(ArtistTopTracks::truncating(
                    catalog.clone(),
                    cfg.catalog.market.clone(),
                )));
                if all {
                    engine.set_strategy(Box::new(ArtistTopTracks::passthrough(
                        catalog,
                        cfg.catalog.market,
                    )));
                }

                info!("Using strategy: {}", engine.strategy_name());
                println!("Recommendations for {seed}:");
                print_tracks(&engine.get_recommendations(&[seed], count));
            }
        }

        Commands::Auth => {
            let catalog = SpotifyCatalog::from_config(&cfg.catalog)?;
            catalog.authenticate()?;

            match catalog.credential() {
                Some(credential) => println!(
                    "Authenticated, {} token valid until {}",
                    credential.token_type,
                    credential.expires_at().to_rfc3339()
                ),
                None => println!("Authenticated"),
            }
        }
    }

    Ok(())
}

fn print_tracks(tracks: &[Track]) {
    if tracks.is_empty() {
        println!("  (no tracks)");
    }
    for (i, track) in tracks.iter().enumerate() {
        println!(
            "{:>3}. {} [{}]  id: {}",
            i + 1,
            track,
            track.formatted_duration(),
            track.id
        );
    }
}

/// Blocks until Ctrl-C or SIGTERM arrives.
fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start signal runtime")?;

    runtime.block_on(async {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {e}");
                    std::future::pending::<()>().await
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            result = ctrl_c => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Received Ctrl+C, shutting down");
            },
            _ = terminate => {
                info!("Received terminate signal, shutting down");
            },
        }
        Ok::<(), anyhow::Error>(())
    })
}
