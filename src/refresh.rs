//! Background re-authentication of the catalog client.

use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{error, info};

use crate::{
    catalog::{Catalog, error::AuthError},
    shutdown::Shutdown,
};

pub struct CredentialRefresher {
    catalog: Arc<dyn Catalog>,
    interval: Duration,
    retry: Duration,
    shutdown: Shutdown,
}

impl CredentialRefresher {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        interval: Duration,
        retry: Duration,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            catalog,
            interval,
            retry,
            shutdown,
        }
    }

    /// the immediate first authentication, before any request can be served
    pub fn prime(&self) -> Result<(), AuthError> {
        info!("Authenticating with catalog API...");
        self.catalog.authenticate()
    }

    /// starts the loop; the first refresh comes one interval after `prime`
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        let first_wait = self.interval;
        self.spawn_after(first_wait)
    }

    fn spawn_after(self, first_wait: Duration) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("credential-refresh".to_string())
            .spawn(move || self.run(first_wait))
    }

    fn run(self, first_wait: Duration) {
        let mut wait = first_wait;
        // a failed refresh leaves the store untouched, so the previous
        // credential stays in use until a later attempt succeeds
        while !self.shutdown.wait_timeout(wait) {
            wait = self.next_wait(self.refresh_once());
        }
        info!("Credential refresher stopped");
    }

    fn next_wait(&self, refreshed: bool) -> Duration {
        if refreshed {
            self.interval
        } else {
            self.retry.min(self.interval)
        }
    }

    fn refresh_once(&self) -> bool {
        info!("Refreshing catalog credential...");
        match self.catalog.authenticate() {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Failed to refresh catalog credential, keeping the previous one: {e}"
                );
                false
            }
        }
    }
}
