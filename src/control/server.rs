//! Control channel over a Unix domain socket
//!
//! One connection is one session. Each command line is applied as soon as
//! it arrives and answered with `ok` or `error: <message>`. A session that
//! reaches EOF without sending a command is a read: it receives the rule
//! listing and then EOF.
//!
//! A connection is either a write session or a read session. Once a command
//! has been sent, the listing is not returned on that connection; read the
//! rules back over a new one. A session that stays silent for longer than
//! the idle timeout is closed.

use super::handler::ControlSession;
use crate::dataplane::Engine;
use crate::{Error, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Default well-known control socket path
pub const DEFAULT_SOCKET_PATH: &str = "/run/fwall.sock";

/// How long a session may wait for the next line or for the peer to read
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Accepts control sessions and applies them to the engine
pub struct ControlServer {
    listener: UnixListener,
    path: PathBuf,
    engine: Arc<Engine>,
    max_command_len: usize,
    idle_timeout: Duration,
}

impl ControlServer {
    /// Bind the control socket, replacing a stale socket file left behind
    /// by an earlier run.
    pub fn bind<P: AsRef<Path>>(
        path: P,
        engine: Arc<Engine>,
        max_command_len: usize,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("removed stale control socket {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::Io(e)),
        }

        let listener = UnixListener::bind(&path)?;
        info!("control channel listening on {}", path.display());

        Ok(Self {
            listener,
            path,
            engine,
            max_command_len,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        })
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept sessions until an accept error occurs
    pub async fn run(&self) -> Result<()> {
        loop {
            let (stream, _) = self.listener.accept().await?;
            let engine = self.engine.clone();
            let max_command_len = self.max_command_len;
            let idle_timeout = self.idle_timeout;
            tokio::spawn(async move {
                if let Err(e) = handle_session(stream, engine, max_command_len, idle_timeout).await
                {
                    warn!("control session failed: {}", e);
                }
            });
        }
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        if std::fs::remove_file(&self.path).is_ok() {
            debug!("removed control socket {}", self.path.display());
        }
    }
}

/// Serve one session on an accepted stream
pub async fn handle_session(
    stream: UnixStream,
    engine: Arc<Engine>,
    max_command_len: usize,
    idle_timeout: Duration,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut session = ControlSession::with_limit(&engine, max_command_len);
    let mut line = Vec::new();
    let mut commands = 0usize;

    loop {
        // One spare byte for a trailing '\r'
        let read = read_line(&mut reader, max_command_len + 1, &mut line);
        let len = match timeout(idle_timeout, read).await {
            Ok(len) => len?,
            Err(_) => {
                debug!("control session idle for {:?}, closing", idle_timeout);
                return Ok(());
            }
        };
        let Some(len) = len else {
            break;
        };
        if len == line.len() && line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        commands += 1;

        let result = if len > line.len() {
            Err(session.reject(Error::CommandTooLong {
                len,
                max: max_command_len,
            }))
        } else {
            match std::str::from_utf8(&line) {
                Ok(text) => session.write(text),
                Err(_) => Err(session.reject(Error::UnknownOperation(
                    String::from_utf8_lossy(&line).into_owned(),
                ))),
            }
        };

        let reply = match result {
            Ok(_) => "ok\n".to_string(),
            Err(e) => format!("error: {}\n", e),
        };
        send(&mut write_half, reply.as_bytes(), idle_timeout).await?;
    }

    if commands == 0 {
        let listing = session.read();
        send(&mut write_half, listing.as_bytes(), idle_timeout).await?;
    }
    write_half.shutdown().await?;
    Ok(())
}

/// Read one line into `buf` without its `\n`, keeping at most `keep` bytes.
///
/// Returns the full length of the line, which exceeds `buf.len()` when the
/// line was cut short, or `None` at EOF.
async fn read_line<R>(reader: &mut R, keep: usize, buf: &mut Vec<u8>) -> io::Result<Option<usize>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut len = 0;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok((len > 0).then_some(len));
        }

        let (part, consumed, complete) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos, pos + 1, true),
            None => (available.len(), available.len(), false),
        };
        let room = keep.saturating_sub(buf.len());
        buf.extend_from_slice(&available[..part.min(room)]);
        len += part;
        reader.consume(consumed);

        if complete {
            return Ok(Some(len));
        }
    }
}

async fn send<W>(writer: &mut W, data: &[u8], idle_timeout: Duration) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    match timeout(idle_timeout, writer.write_all(data)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(Error::Io(io::ErrorKind::TimedOut.into())),
    }
}
