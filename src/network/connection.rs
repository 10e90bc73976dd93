//! Request Context
//!
//! One accepted connection carrying exactly one HTTP request.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use crate::error::{Result, SydbError};
use crate::pool::Job;
use crate::protocol::{read_request, write_response, Response};

use super::gateway::Gateway;

/// An accepted connection waiting for (or being served by) a worker
pub struct RequestContext {
    stream: TcpStream,

    /// Peer address for rate limiting and logging
    peer_addr: SocketAddr,

    /// When the accept loop took the connection
    accepted_at: Instant,
}

impl RequestContext {
    /// Wrap an accepted stream
    pub fn new(stream: TcpStream) -> Result<Self> {
        let peer_addr = stream.peer_addr()?;

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            peer_addr,
            accepted_at: Instant::now(),
        })
    }

    /// Configure connection timeouts; zero leaves a direction unbounded
    pub fn set_timeouts(&self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.stream
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.stream
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Read the request, route it, write the response
    pub fn serve(&self, gateway: &Gateway) -> Result<()> {
        let waited = self.accepted_at.elapsed();
        let mut reader = BufReader::new(&self.stream);

        let request = match read_request(&mut reader) {
            Ok(request) => request,
            Err(e) if is_disconnect(&e) => {
                tracing::debug!("Client {} went away before sending a request", self.peer_addr);
                return Ok(());
            }
            Err(e) => {
                tracing::warn!("Bad request from {}: {}", self.peer_addr, e);
                return self.respond(&Response::failure(400, &e.to_string()));
            }
        };

        tracing::trace!(
            "{} {} from {} (queued {:?})",
            request.method,
            request.path,
            self.peer_addr,
            waited
        );

        let response = gateway.handle(&request, self.client_ip());
        tracing::debug!(
            "{} {} -> {} in {:?}",
            request.method,
            request.path,
            response.status,
            self.accepted_at.elapsed()
        );
        self.respond(&response)
    }

    /// Send a response, tolerating clients that already hung up
    pub fn respond(&self, response: &Response) -> Result<()> {
        let mut writer = BufWriter::new(&self.stream);
        match write_response(&mut writer, response) {
            Err(e) if is_disconnect(&e) => {
                tracing::debug!(
                    "Client {} disconnected before response could be sent: {}",
                    self.peer_addr,
                    e
                );
                Ok(())
            }
            other => other,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn client_ip(&self) -> IpAddr {
        self.peer_addr.ip()
    }

    pub fn accepted_at(&self) -> Instant {
        self.accepted_at
    }
}

impl Job for RequestContext {
    fn cleanup(self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Errors meaning the peer is gone or idle; nothing useful can be sent back
fn is_disconnect(error: &SydbError) -> bool {
    match error {
        SydbError::Io(e) => matches!(
            e.kind(),
            ErrorKind::UnexpectedEof
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
                | ErrorKind::WouldBlock
                | ErrorKind::TimedOut
        ),
        _ => false,
    }
}
