//! HTTP Server
//!
//! Accepts connections and dispatches them to the worker pool.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;
use crate::pool::{Job, WorkerPool};
use crate::protocol::Response;

use super::connection::RequestContext;
use super::gateway::Gateway;

/// Stops a running [`Server`] from another thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    /// Connected to once so a blocked `accept` returns
    wake_addr: SocketAddr,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        if self.flag.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Shutdown requested");
        let _ = TcpStream::connect_timeout(&self.wake_addr, Duration::from_secs(1));
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// HTTP server for SYDB
pub struct Server {
    config: Config,
    listener: TcpListener,
    gateway: Arc<Gateway>,
    workers: WorkerPool<RequestContext>,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Bind the listen address and start the worker pool
    pub fn bind(config: Config, engine: Arc<Engine>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        let gateway = Arc::new(Gateway::from_config(engine, &config));

        let handler_gateway = Arc::clone(&gateway);
        let workers = WorkerPool::new(
            config.worker_count,
            config.queue_capacity,
            config.submit_timeout(),
            move |context: &mut RequestContext| context.serve(&handler_gateway),
        )?;
        gateway.attach_workers(workers.gauge());

        tracing::info!(
            "Listening on {} ({} workers, queue capacity {})",
            listener.local_addr()?,
            config.worker_count,
            config.queue_capacity
        );

        Ok(Self {
            config,
            listener,
            gateway,
            workers,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub fn shutdown_handle(&self) -> Result<ShutdownHandle> {
        let mut wake_addr = self.local_addr()?;
        if wake_addr.ip().is_unspecified() {
            let loopback = match wake_addr {
                SocketAddr::V4(_) => std::net::Ipv4Addr::LOCALHOST.into(),
                SocketAddr::V6(_) => std::net::Ipv6Addr::LOCALHOST.into(),
            };
            wake_addr.set_ip(loopback);
        }
        Ok(ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
            wake_addr,
        })
    }

    /// Accept connections until shut down (blocking)
    ///
    /// On exit the worker pool is drained and pooled files are closed.
    pub fn run(&self) -> Result<()> {
        for stream in self.listener.incoming() {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            match stream {
                Ok(stream) => self.dispatch(stream),
                Err(e) => tracing::warn!("Accept failed: {}", e),
            }
        }

        self.workers.shutdown();
        self.gateway.engine().close();
        tracing::info!("Server stopped");
        Ok(())
    }

    /// Hand a connection to the pool, answering 503 when it is saturated
    fn dispatch(&self, stream: TcpStream) {
        let context = match RequestContext::new(stream) {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!("Dropping connection: {}", e);
                return;
            }
        };
        if let Err(e) =
            context.set_timeouts(self.config.read_timeout_ms, self.config.write_timeout_ms)
        {
            tracing::warn!("Failed to set timeouts for {}: {}", context.peer_addr(), e);
        }

        if let Err(rejected) = self.workers.submit(context) {
            tracing::warn!(
                "Rejecting {}: {}",
                rejected.job.peer_addr(),
                rejected.error
            );
            let _ = rejected.job.respond(&Response::from_error(&rejected.error));
            rejected.job.cleanup();
        }
    }
}
