//! Single-client Unix socket channel server.
//!
//! State machine per instance: Idle → Listening → Connected → Idle, looped,
//! with stop reachable from any point. Exactly one peer is served at a time;
//! while connected the server reads one request line, invokes the handler
//! synchronously, writes one response line, and loops until the peer
//! disconnects or the server is stopped.
//!
//! Both the accept wait and an idle read are cancellable: the listener is
//! non-blocking and polled against the stop flag, and the connected stream
//! carries a short read timeout, so a stop request is honored within one
//! poll slice instead of blocking indefinitely.

use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info};

/// How long a single accept/read poll slice may block.
const POLL_SLICE: Duration = Duration::from_millis(100);

/// Attempts to create the listening socket before giving up.
const BIND_ATTEMPTS: u32 = 3;

/// Backoff after a transport fault in the accept loop.
const ACCEPT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Error type for channel server failures.
///
/// Only the fatal case is represented: failure to create the listening
/// socket after repeated retries. Transport faults during accept/read/write
/// are logged and retried, never surfaced.
#[derive(Debug)]
pub enum ServerError {
    Bind(io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Bind(e) => write!(f, "cannot bind channel socket: {}", e),
        }
    }
}

impl std::error::Error for ServerError {}

/// Handler invoked with one request line, returning one response line
/// (without trailing newline).
pub type RequestHandler = dyn Fn(&str) -> String + Send + Sync;

/// Accept/serve loop over a Unix domain socket.
pub struct ChannelServer {
    socket_path: PathBuf,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ChannelServer {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Binds the socket and starts the accept loop in a background thread.
    ///
    /// A stale socket file from a previous run is removed first. Binding is
    /// retried a few times before the fault is surfaced as fatal.
    pub fn start(&mut self, handler: Arc<RequestHandler>) -> Result<(), ServerError> {
        if self.is_running() {
            return Ok(());
        }

        // Stale file from an unclean shutdown
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = bind_with_retry(&self.socket_path)?;
        listener
            .set_nonblocking(true)
            .map_err(ServerError::Bind)?;

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let path = self.socket_path.clone();

        self.handle = Some(std::thread::spawn(move || {
            listen_loop(listener, handler, running);
            debug!("channel server loop exited ({})", path.display());
        }));

        info!("channel server listening on {}", self.socket_path.display());
        Ok(())
    }

    /// Stops the server: abandons a pending accept or read, closes any open
    /// connection, joins the serving thread, and unlinks the socket so later
    /// connection attempts fail cleanly.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }

        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            error!("channel server thread panicked");
        }
        let _ = std::fs::remove_file(&self.socket_path);
        info!("channel server stopped");
    }
}

impl Drop for ChannelServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn bind_with_retry(path: &Path) -> Result<UnixListener, ServerError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match UnixListener::bind(path) {
            Ok(listener) => return Ok(listener),
            Err(e) if attempt < BIND_ATTEMPTS => {
                error!(
                    "bind {} failed (attempt {}/{}): {}",
                    path.display(),
                    attempt,
                    BIND_ATTEMPTS,
                    e
                );
                std::thread::sleep(ACCEPT_RETRY_BACKOFF);
            }
            Err(e) => return Err(ServerError::Bind(e)),
        }
    }
}

fn listen_loop(listener: UnixListener, handler: Arc<RequestHandler>, running: Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                info!("client connected");
                serve_client(stream, &handler, &running);
                info!("client session ended");
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                std::thread::sleep(POLL_SLICE);
            }
            Err(e) => {
                error!("accept failed: {}", e);
                std::thread::sleep(ACCEPT_RETRY_BACKOFF);
            }
        }
    }
}

/// Serves one connected peer until it disconnects or the server stops.
fn serve_client(stream: UnixStream, handler: &Arc<RequestHandler>, running: &Arc<AtomicBool>) {
    // The accepted stream inherits non-blocking mode from the listener;
    // switch to a short read timeout so the loop can observe the stop flag.
    if stream.set_nonblocking(false).is_err() || stream.set_read_timeout(Some(POLL_SLICE)).is_err()
    {
        error!("cannot configure client stream");
        return;
    }

    let mut writer = match stream.try_clone() {
        Ok(w) => w,
        Err(e) => {
            error!("cannot clone client stream: {}", e);
            return;
        }
    };
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    while running.load(Ordering::SeqCst) {
        match reader.read_line(&mut line) {
            Ok(0) => {
                debug!("client disconnected");
                break;
            }
            Ok(_) => {
                if line.trim().is_empty() {
                    line.clear();
                    continue;
                }

                let response = handler(&line);
                line.clear();

                if let Err(e) = writer
                    .write_all(response.as_bytes())
                    .and_then(|_| writer.write_all(b"\n"))
                    .and_then(|_| writer.flush())
                {
                    error!("write to client failed: {}", e);
                    break;
                }
            }
            // Idle read slice expired; partial input stays buffered in `line`
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
            Err(e) => {
                error!("read from client failed: {}", e);
                break;
            }
        }
    }
}
