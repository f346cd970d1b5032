//! HTTP API server
//!
//! Blocking accept loop on its own thread, one thread per connection.

use anyhow::{Context, Result};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::handlers::{route, ApiState};
use super::http::{Request, Response};
use crate::util::create_tcp_listener;

/// Per-connection read timeout
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// A bound, not yet serving, API listener
pub struct ApiServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl ApiServer {
    /// Bind the listener
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = create_tcp_listener(addr)
            .with_context(|| format!("Failed to bind API listener on {addr}"))?;
        let local_addr = listener.local_addr()?;
        Ok(Self { listener, local_addr })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve on a background thread
    pub fn spawn(self, state: ApiState) -> Result<thread::JoinHandle<()>> {
        let addr = self.local_addr;
        let handle = thread::Builder::new()
            .name("api-accept".into())
            .spawn(move || self.run(state))
            .context("Failed to spawn API thread")?;
        info!(%addr, "API server started");
        Ok(handle)
    }

    fn run(self, state: ApiState) {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let state = state.clone();
                    thread::spawn(move || {
                        if let Err(e) = handle_connection(stream, &state) {
                            debug!(error = %e, "Request handling error");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Bind and start serving in one step
pub fn start_api_server(addr: SocketAddr, state: ApiState) -> Result<SocketAddr> {
    let server = ApiServer::bind(addr)?;
    let local_addr = server.local_addr();
    server.spawn(state)?;
    Ok(local_addr)
}

fn handle_connection(mut stream: TcpStream, state: &ApiState) -> std::io::Result<()> {
    stream.set_read_timeout(Some(READ_TIMEOUT))?;

    let response = match Request::read_from(&stream) {
        Ok(Some(request)) => {
            let response = route(&request, state);
            debug!(
                method = %request.method,
                path = %request.path,
                status = response.code(),
                "Request served"
            );
            response
        }
        Ok(None) => return Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            Response::text("400 Bad Request", e.to_string())
        }
        Err(e) => return Err(e),
    };

    response.write_to(&mut stream)
}
