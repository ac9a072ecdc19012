use std::{
    io::{self, BufWriter},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::Arc,
    time::Duration,
};

use log::{debug, info, warn};

use crate::{
    config::{OverloadPolicy, ServerConfig},
    server::{
        error::ServerError,
        handler::{self, HandlerContext},
        pool::{Rejected, WorkerPool},
        protocol::{Response, SERVER_BUSY},
    },
    shutdown::Shutdown,
};

/// Accepts clients and hands each connection to the worker pool.
pub struct Listener {
    listener: TcpListener,
    pool: WorkerPool<TcpStream>,
    overload: OverloadPolicy,
    shutdown: Shutdown,
    poll_interval: Duration,
    write_timeout: Duration,
    shutdown_grace: Duration,
}

impl Listener {
    pub fn bind(
        config: &ServerConfig,
        context: Arc<HandlerContext>,
        shutdown: Shutdown,
    ) -> Result<Self, ServerError> {
        let addr = config.addr();
        let bind_error = |source: io::Error| ServerError::Bind {
            addr: addr.clone(),
            source,
        };

        let listener = TcpListener::bind(&addr).map_err(bind_error)?;
        // polled, so the loop notices shutdown without a wake-up connection
        listener.set_nonblocking(true).map_err(bind_error)?;

        let pool = WorkerPool::new(
            "connection",
            config.workers,
            config.queue_capacity,
            move |stream: TcpStream| handler::serve_connection(stream, &context),
        )
        .map_err(ServerError::Spawn)?;

        Ok(Self {
            listener,
            pool,
            overload: config.overload,
            shutdown,
            poll_interval: config.poll_interval(),
            write_timeout: config.write_timeout(),
            shutdown_grace: config.shutdown_grace(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts until shutdown, then drains the pool.
    pub fn run(self) {
        match self.local_addr() {
            Ok(addr) => info!(
                "Listening on {addr} with {} workers ({:?} when busy)",
                self.pool.size(),
                self.overload
            ),
            Err(e) => warn!("Listening on an unknown address: {e}"),
        }

        while !self.shutdown.is_triggered() {
            match self.listener.accept() {
                Ok((stream, peer)) => self.dispatch(stream, peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.shutdown.wait_timeout(self.poll_interval);
                }
                Err(e) => {
                    warn!("Failed to accept connection: {e}");
                    self.shutdown.wait_timeout(self.poll_interval);
                }
            }
        }

        info!("Stopped accepting connections");
        let Self {
            listener,
            pool,
            shutdown_grace,
            ..
        } = self;
        drop(listener);

        let abandoned = pool.shutdown(shutdown_grace);
        if abandoned > 0 {
            warn!("{abandoned} connection workers did not finish within {shutdown_grace:?}");
        }
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nonblocking(false) {
            warn!("Dropping connection from {peer}: {e}");
            return;
        }

        let submitted = match self.overload {
            OverloadPolicy::Reject => self.pool.try_submit(stream),
            OverloadPolicy::Block => self.pool.submit(stream),
        };

        match submitted {
            Ok(()) => debug!("Queued connection from {peer}"),
            Err(Rejected::Full(stream)) => {
                warn!("All workers busy, rejecting {peer}");
                self.reject_busy(stream, peer);
            }
            Err(Rejected::Closed(_)) => debug!("Pool closed, dropping connection from {peer}"),
        }
    }

    fn reject_busy(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_write_timeout(Some(self.write_timeout)) {
            debug!("Could not set write timeout for {peer}: {e}");
        }
        let mut writer = BufWriter::new(&stream);
        if let Err(e) = handler::write_response(&mut writer, &Response::error(SERVER_BUSY)) {
            debug!("Could not tell {peer} the server is busy: {e}");
        }
    }
}
