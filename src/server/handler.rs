use std::{
    io::{self, BufRead, BufReader, BufWriter, Read, Write},
    net::{SocketAddr, TcpStream},
    sync::Arc,
    time::Duration,
};

use log::{debug, error, info, warn};

use crate::{
    catalog::{Catalog, error::UpstreamError},
    config::ServerConfig,
    recommend::artist_top_tracks,
    server::{
        error::{ConnectionError, HandlerError},
        protocol::{Action, DEFAULT_SEARCH_LIMIT, ProtocolError, Request, Response, parse_request},
    },
    shutdown::Shutdown,
};

/// Everything a connection needs besides its socket, shared by all workers.
pub struct HandlerContext {
    catalog: Arc<dyn Catalog>,
    market: String,
    shutdown: Shutdown,
    poll_interval: Duration,
    write_timeout: Duration,
    max_line_bytes: usize,
}

impl HandlerContext {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        market: impl Into<String>,
        shutdown: Shutdown,
        config: &ServerConfig,
    ) -> Self {
        Self {
            catalog,
            market: market.into(),
            shutdown,
            poll_interval: config.poll_interval(),
            write_timeout: config.write_timeout(),
            max_line_bytes: config.max_line_bytes(),
        }
    }

    /// answers one request line; failures become error envelopes
    pub fn handle_line(&self, line: &str) -> Response {
        debug!("Received request: {line}");

        let result = parse_request(line)
            .map_err(HandlerError::from)
            .and_then(|request| self.dispatch(request));

        match result {
            Ok(response) => response,
            Err(e) => {
                if e.is_auth_failure() {
                    warn!("Catalog rejected the current credential, waiting for the next refresh");
                }
                warn!("Request failed: {e}");
                e.into_response()
            }
        }
    }

    fn dispatch(&self, request: Request) -> Result<Response, HandlerError> {
        match request {
            Request::Search { query, limit } => {
                self.search(&query, limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
            }
            Request::Recommend { track_id } => self.recommend(&track_id),
        }
    }

    fn search(&self, query: &str, limit: u32) -> Result<Response, HandlerError> {
        let mut tracks = self
            .catalog
            .search_tracks(query, limit)
            .map_err(HandlerError::Search)?;
        tracks.truncate(limit as usize);

        info!("Search for '{query}' returned {} tracks", tracks.len());
        Ok(Response::success(Action::Search, tracks))
    }

    fn recommend(&self, track_id: &str) -> Result<Response, HandlerError> {
        let seed = self
            .catalog
            .get_track_by_id(track_id)
            .map_err(|e| match e {
                UpstreamError::NotFound(_) => HandlerError::TrackNotFound(track_id.to_string()),
                e => HandlerError::Upstream(e),
            })?;

        let tracks = artist_top_tracks(self.catalog.as_ref(), &seed, &self.market)?;

        info!("Recommended {} tracks for {seed}", tracks.len());
        Ok(Response::success(Action::Recommend, tracks))
    }
}

/// Serves one client connection until it closes, fails or the server stops.
pub struct ConnectionHandler {
    stream: TcpStream,
    peer: SocketAddr,
    context: Arc<HandlerContext>,
}

impl ConnectionHandler {
    pub fn new(stream: TcpStream, peer: SocketAddr, context: Arc<HandlerContext>) -> Self {
        Self {
            stream,
            peer,
            context,
        }
    }

    pub fn run(self) -> Result<(), ConnectionError> {
        let Self {
            stream,
            peer,
            context,
        } = self;

        if context.shutdown.is_triggered() {
            debug!("Server is stopping, closing queued connection from {peer}");
            return Ok(());
        }

        // the read timeout bounds how long a quiet client can delay shutdown
        stream
            .set_read_timeout(Some(context.poll_interval))
            .map_err(ConnectionError::Setup)?;
        stream
            .set_write_timeout(Some(context.write_timeout))
            .map_err(ConnectionError::Setup)?;

        let reader = BufReader::new(stream.try_clone().map_err(ConnectionError::Setup)?);
        let writer = BufWriter::new(stream);
        serve_lines(&context, peer, reader, writer)
    }
}

/// Answers each request line read from `reader` until end of stream, an
/// oversized line or shutdown.
fn serve_lines(
    context: &HandlerContext,
    peer: SocketAddr,
    mut reader: impl BufRead,
    mut writer: impl Write,
) -> Result<(), ConnectionError> {
    let mut line = Vec::new();

    loop {
        // one byte past the limit is enough to tell the line is too long
        let remaining = (context.max_line_bytes + 1).saturating_sub(line.len()) as u64;
        match reader.by_ref().take(remaining).read_until(b'\n', &mut line) {
            Ok(0) => {
                // a last request without a trailing newline still counts
                if !line.is_empty() {
                    respond(context, &mut writer, &line)?;
                }
                debug!("Client {peer} closed the connection");
                return Ok(());
            }
            Ok(_) if line.ends_with(b"\n") => {
                respond(context, &mut writer, &line)?;
                line.clear();
                if context.shutdown.is_triggered() {
                    return Ok(());
                }
            }
            Ok(_) if line.len() > context.max_line_bytes => {
                let limit = context.max_line_bytes;
                warn!("Closing connection to {peer}: request line over {limit} bytes");
                write_response(
                    &mut writer,
                    &HandlerError::from(ProtocolError::LineTooLong { limit }).into_response(),
                )?;
                return Ok(());
            }
            // partial line, kept until the rest arrives
            Ok(_) => {}
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                if context.shutdown.is_triggered() {
                    debug!("Closing connection to {peer} for shutdown");
                    return Ok(());
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(ConnectionError::Read(e)),
        }
    }
}

fn respond(
    context: &HandlerContext,
    writer: &mut impl Write,
    raw: &[u8],
) -> Result<(), ConnectionError> {
    let response = match std::str::from_utf8(raw) {
        Ok(line) if line.trim().is_empty() => return Ok(()),
        Ok(line) => context.handle_line(line.trim()),
        Err(_) => HandlerError::from(ProtocolError::InvalidUtf8).into_response(),
    };
    write_response(writer, &response)
}

/// writes `response` as one line and flushes it
pub fn write_response(writer: &mut impl Write, response: &Response) -> Result<(), ConnectionError> {
    writer
        .write_all(response.to_line().as_bytes())
        .and_then(|()| writer.write_all(b"\n"))
        .and_then(|()| writer.flush())
        .map_err(ConnectionError::Write)
}

/// entry point for pool workers
pub fn serve_connection(stream: TcpStream, context: &Arc<HandlerContext>) {
    let peer = match stream.peer_addr() {
        Ok(peer) => peer,
        Err(e) => {
            warn!("Dropping connection without a peer address: {e}");
            return;
        }
    };

    info!("Client connected: {peer}");
    match ConnectionHandler::new(stream, peer, Arc::clone(context)).run() {
        Ok(()) => info!("Client disconnected: {peer}"),
        Err(e) => error!("Connection to {peer} ended with an error: {e}"),
    }
}
