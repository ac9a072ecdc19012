//! TCP front end: a polled accept loop feeding a bounded pool of connection
//! workers, plus the credential refresher running beside it.

use std::{
    net::SocketAddr,
    sync::Arc,
    thread::{self, JoinHandle},
};

use log::{error, info};

use crate::{
    catalog::Catalog,
    config::{RefreshConfig, ServerConfig},
    refresh::CredentialRefresher,
    shutdown::Shutdown,
};

pub mod error;
pub mod handler;
pub mod listener;
pub mod pool;
pub mod protocol;

use error::ServerError;
use handler::HandlerContext;
use listener::Listener;

pub struct Server {
    catalog: Arc<dyn Catalog>,
    config: ServerConfig,
    refresh: RefreshConfig,
    market: String,
}

impl Server {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        config: ServerConfig,
        refresh: RefreshConfig,
        market: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            config,
            refresh,
            market: market.into(),
        }
    }

    /// Authenticates, binds and starts serving in background threads.
    ///
    /// Nothing is listening if authentication or binding fails.
    pub fn start(self) -> Result<RunningServer, ServerError> {
        let shutdown = Shutdown::new();
        let refresher = CredentialRefresher::new(
            Arc::clone(&self.catalog),
            self.refresh.interval(),
            self.refresh.retry(),
            shutdown.clone(),
        );
        refresher.prime()?;

        let context = Arc::new(HandlerContext::new(
            Arc::clone(&self.catalog),
            self.market,
            shutdown.clone(),
            &self.config,
        ));
        let listener = Listener::bind(&self.config, context, shutdown.clone())?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: self.config.addr(),
            source,
        })?;

        let accept = thread::Builder::new()
            .name("accept".to_string())
            .spawn(move || listener.run())
            .map_err(ServerError::Spawn)?;

        let refresh = match refresher.spawn() {
            Ok(handle) => handle,
            Err(e) => {
                shutdown.trigger();
                let _ = accept.join();
                return Err(ServerError::Spawn(e));
            }
        };

        info!("Music recommendation server started on {local_addr}");
        Ok(RunningServer {
            local_addr,
            shutdown,
            accept,
            refresh,
            catalog: self.catalog,
        })
    }
}

pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    accept: JoinHandle<()>,
    refresh: JoinHandle<()>,
    catalog: Arc<dyn Catalog>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting, lets workers finish within the grace period, stops the
    /// refresher and releases the catalog client.
    pub fn shutdown(self) {
        info!("Shutting down server...");
        self.shutdown.trigger();

        if self.accept.join().is_err() {
            error!("Accept loop panicked");
        }
        if self.refresh.join().is_err() {
            error!("Credential refresher panicked");
        }
        drop(self.catalog);

        info!("Server shutdown complete");
    }
}
