//! Blocking client for the line protocol, used by the CLI.

use std::{
    io::{self, BufRead, BufReader, BufWriter, Write},
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

use log::debug;
use thiserror::Error;

use crate::{
    domain::track::Track,
    server::protocol::{Request, Response},
};

/// how long to wait for the server to answer one request
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid response from server: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("server closed the connection")]
    Closed,

    #[error("server error: {0}")]
    Server(String),
}

pub struct ServerConnection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl ServerConnection {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(RESPONSE_TIMEOUT))?;
        debug!("Connected to {}", stream.peer_addr()?);

        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
        })
    }

    /// sends one request and waits for its response line
    pub fn send(&mut self, request: &Request) -> Result<Response, ClientError> {
        serde_json::to_writer(&mut self.writer, request)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(ClientError::Closed);
        }
        Ok(serde_json::from_str(line.trim())?)
    }

    pub fn search_tracks(
        &mut self,
        query: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Track>, ClientError> {
        let response = self.send(&Request::Search {
            query: query.to_string(),
            limit,
        })?;
        Self::into_tracks(response)
    }

    pub fn recommend(&mut self, track_id: &str) -> Result<Vec<Track>, ClientError> {
        let response = self.send(&Request::Recommend {
            track_id: track_id.to_string(),
        })?;
        Self::into_tracks(response)
    }

    fn into_tracks(response: Response) -> Result<Vec<Track>, ClientError> {
        match response {
            Response::Success { data, .. } => Ok(data),
            Response::Error { message } => Err(ClientError::Server(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::fake::FakeCatalog,
        config::{RefreshConfig, ServerConfig},
        domain::track::mock_track,
        server::{RunningServer, Server},
    };
    use std::{net::TcpListener, sync::Arc, thread};

    fn start() -> anyhow::Result<RunningServer> {
        let catalog = FakeCatalog::new()
            .with_search_results(vec![
                mock_track("1", "Uprising", &["Muse"]),
                mock_track("2", "Starlight", &["Muse"]),
            ])
            .with_track(mock_track("1", "Uprising", &["Muse"]))
            .with_artist("Muse", "muse")
            .with_top_tracks("muse", vec![mock_track("3", "Hysteria", &["Muse"])]);
        let config = ServerConfig {
            port: 0,
            poll_interval_ms: 10,
            ..ServerConfig::default()
        };
        Ok(Server::new(Arc::new(catalog), config, RefreshConfig::default(), "US").start()?)
    }

    #[test]
    fn test_search_and_recommend() -> anyhow::Result<()> {
        let server = start()?;
        let mut connection = ServerConnection::connect(server.local_addr())?;

        let found = connection.search_tracks("Muse", None)?;
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "Uprising");

        let recommended = connection.recommend("1")?;
        assert_eq!(recommended.len(), 1);
        assert_eq!(recommended[0].name, "Hysteria");

        drop(connection);
        server.shutdown();
        Ok(())
    }

    #[test]
    fn test_server_error_is_surfaced() -> anyhow::Result<()> {
        let server = start()?;
        let mut connection = ServerConnection::connect(server.local_addr())?;

        let err = connection.recommend("nope").unwrap_err();

        assert!(matches!(err, ClientError::Server(ref m) if m == "Track not found: nope"));

        drop(connection);
        server.shutdown();
        Ok(())
    }

    #[test]
    fn test_closed_connection() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let peer = thread::spawn(move || {
            // accept and hang up without answering
            let _ = listener.accept();
        });

        let mut connection = ServerConnection::connect(addr)?;
        peer.join().unwrap();

        assert!(matches!(
            connection.search_tracks("Muse", None),
            Err(ClientError::Closed) | Err(ClientError::Io(_))
        ));
        Ok(())
    }
}
