//! The single-threaded, cooperative, readiness-driven event loop.
//!
//! An `epoll` fd registers every connection's socket with
//! `EPOLLIN | EPOLLOUT`, and `run` blocks in `epoll::wait` between ticks.
//! There are no worker threads; a streaming handler that blocks stalls every
//! other connection, as called out in the concurrency model.

use crate::address::Address;
use crate::connection::{Connection, MAX_INPUT_BUFFER};
use crate::dispatcher::{CallFlags, Dispatcher, Replies};
use crate::error::{ErrorKind, Result};
use crate::message::{parse_request, serialize_reply, Reply};
use std::collections::HashMap;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixListener;

/// Configuration knobs for a running service: the per-connection input
/// buffer cap and the socket's unix mode, threaded through constructors
/// rather than hardcoded.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_input_buffer: usize,
    pub socket_mode: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            max_input_buffer: MAX_INPUT_BUFFER,
            socket_mode: None,
        }
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone, Default)]
pub struct ServerBuilder {
    config: ServerConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        ServerBuilder::default()
    }

    pub fn max_input_buffer(mut self, bytes: usize) -> Self {
        self.config.max_input_buffer = bytes;
        self
    }

    pub fn socket_mode(mut self, mode: u32) -> Self {
        self.config.socket_mode = Some(mode);
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}

/// Per-connection server-side state: buffered I/O plus, while a streaming
/// call is in flight, the iterator producing its remaining replies.
struct ServerConn {
    conn: Connection,
    active_stream: Option<Box<dyn Iterator<Item = Reply> + Send>>,
}

/// Binds a listening socket and drives [`Dispatcher`] against every
/// connection it accepts.
pub struct Server {
    listener: UnixListener,
    dispatcher: Dispatcher,
    config: ServerConfig,
    epoll_fd: RawFd,
    conns: HashMap<RawFd, ServerConn>,
}

const LISTENER_TOKEN: u64 = u64::MAX;

impl Server {
    pub fn bind(address: &str, dispatcher: Dispatcher, config: ServerConfig) -> Result<Self> {
        let addr = Address::parse(address)?;
        let path = match &addr {
            Address::Unix { path, .. } => path.clone(),
            Address::Exec { .. } => {
                return Err(ErrorKind::Other(
                    "Server::bind does not spawn exec: transports; bind the listening \
                     socket yourself and hand it to a caller-supplied transport"
                        .into(),
                ))
            }
        };

        if path.starts_with('\0') {
            return Err(ErrorKind::Other(
                "binding an abstract listening socket is not supported by this entry point".into(),
            ));
        }
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).map_err(ErrorKind::Io)?;
        listener.set_nonblocking(true).map_err(ErrorKind::Io)?;

        if let Some(mode) = config.socket_mode {
            set_mode(&path, mode)?;
        }

        let epoll_fd = epoll::create(false).map_err(ErrorKind::Io)?;
        epoll::ctl(
            epoll_fd,
            epoll::ControlOptions::EPOLL_CTL_ADD,
            listener.as_raw_fd(),
            epoll::Event::new(epoll::Events::EPOLLIN, LISTENER_TOKEN),
        )
        .map_err(ErrorKind::Io)?;

        Ok(Server {
            listener,
            dispatcher,
            config,
            epoll_fd,
            conns: HashMap::new(),
        })
    }

    /// Run the accept/dispatch loop forever (or until an I/O error on the
    /// listening socket itself).
    pub fn run(&mut self) -> Result<()> {
        let mut events = vec![epoll::Event::new(epoll::Events::empty(), 0); 64];
        loop {
            let n = epoll::wait(self.epoll_fd, -1, &mut events).map_err(ErrorKind::Io)?;
            for ev in &events[..n] {
                let token = ev.data;
                if token == LISTENER_TOKEN {
                    self.accept_all()?;
                } else {
                    self.service(token as RawFd);
                }
            }
        }
    }

    fn accept_all(&mut self) -> Result<()> {
        loop {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    stream.set_nonblocking(true).map_err(ErrorKind::Io)?;
                    let fd = stream.as_raw_fd();
                    let conn = Connection::with_cap(Box::new(stream), self.config.max_input_buffer)?;
                    epoll::ctl(
                        self.epoll_fd,
                        epoll::ControlOptions::EPOLL_CTL_ADD,
                        fd,
                        epoll::Event::new(epoll::Events::EPOLLIN | epoll::Events::EPOLLOUT, fd as u64),
                    )
                    .map_err(ErrorKind::Io)?;
                    self.conns.insert(
                        fd,
                        ServerConn {
                            conn,
                            active_stream: None,
                        },
                    );
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(ErrorKind::Io(e)),
            }
        }
    }

    fn service(&mut self, fd: RawFd) {
        let disconnect = self.pump(fd);
        if disconnect {
            self.drop_connection(fd);
        } else {
            self.rearm(fd);
        }
    }

    /// Advance one connection: read what's available, advance any active
    /// stream by one step, dispatch newly-arrived frames, and drain output.
    /// Returns `true` if the connection should be torn down.
    fn pump(&mut self, fd: RawFd) -> bool {
        {
            let server_conn = match self.conns.get_mut(&fd) {
                Some(c) => c,
                None => return true,
            };
            if let Err(e) = server_conn.conn.fill_read() {
                log::warn!("read error on connection: {}", e);
                return true;
            }
        }

        // advance the active stream by one step before parsing new frames:
        // only one reply iterator is active per connection at a time
        let has_active_stream = self
            .conns
            .get(&fd)
            .map(|c| c.active_stream.is_some())
            .unwrap_or(false);

        if has_active_stream {
            let server_conn = self.conns.get_mut(&fd).unwrap();
            let next = server_conn.active_stream.as_mut().unwrap().next();
            match next {
                Some(reply) => {
                    let continues = reply.continues == Some(true);
                    match serialize_reply(&reply) {
                        Ok(bytes) => server_conn.conn.write(&bytes),
                        Err(e) => log::error!("failed to serialize reply: {}", e),
                    }
                    if !continues {
                        server_conn.active_stream = None;
                    }
                }
                None => server_conn.active_stream = None,
            }
        } else {
            let frames = self
                .conns
                .get_mut(&fd)
                .map(|c| c.conn.read_frames())
                .unwrap_or_default();

            for frame in frames {
                if let Err(e) = self.dispatch_frame(fd, &frame) {
                    log::warn!("malformed request: {}", e);
                }
                // at most one in-flight call per connection: stop parsing
                // further buffered frames once one has started a stream
                if self
                    .conns
                    .get(&fd)
                    .map(|c| c.active_stream.is_some())
                    .unwrap_or(false)
                {
                    break;
                }
            }
        }

        if let Err(e) = self
            .conns
            .get_mut(&fd)
            .map(|c| c.conn.drain_write())
            .unwrap_or(Ok(()))
        {
            log::warn!("write error on connection: {}", e);
            return true;
        }

        let c = match self.conns.get(&fd) {
            Some(c) => c,
            None => return true,
        };
        c.conn.eof && !c.conn.has_pending_output()
    }

    fn dispatch_frame(&mut self, fd: RawFd, frame: &[u8]) -> Result<()> {
        let request = parse_request(frame)?;
        let flags = CallFlags {
            more: request.wants_more(),
            oneway: request.is_oneway(),
            upgrade: request.is_upgrade(),
        };
        let replies = self
            .dispatcher
            .dispatch(&request.method, request.parameters.clone(), flags);

        let server_conn = match self.conns.get_mut(&fd) {
            Some(c) => c,
            None => return Ok(()),
        };

        match replies {
            Replies::None => {}
            Replies::One(reply) => {
                let bytes = serialize_reply(&reply)?;
                server_conn.conn.write(&bytes);
            }
            Replies::Many(iter) => {
                server_conn.active_stream = Some(iter);
            }
        }
        Ok(())
    }

    fn rearm(&self, fd: RawFd) {
        if let Some(sc) = self.conns.get(&fd) {
            let interest = sc.conn.desired_events();
            let mut flags = epoll::Events::empty();
            if interest.readable {
                flags |= epoll::Events::EPOLLIN;
            }
            if interest.writable {
                flags |= epoll::Events::EPOLLOUT;
            }
            let _ = epoll::ctl(
                self.epoll_fd,
                epoll::ControlOptions::EPOLL_CTL_MOD,
                fd,
                epoll::Event::new(flags, fd as u64),
            );
        }
    }

    fn drop_connection(&mut self, fd: RawFd) {
        let _ = epoll::ctl(
            self.epoll_fd,
            epoll::ControlOptions::EPOLL_CTL_DEL,
            fd,
            epoll::Event::new(epoll::Events::empty(), 0),
        );
        if let Some(sc) = self.conns.remove(&fd) {
            sc.conn.shutdown();
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.epoll_fd);
        }
    }
}

#[cfg(unix)]
fn set_mode(path: &str, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(ErrorKind::Io)
}

/// Bootstrap socket-activation support: a server started under systemd-style
/// activation inherits its listening socket on fd 3 rather than binding one
/// itself, following the `LISTEN_FDS`/`LISTEN_PID` environment protocol.
pub fn activation_listener() -> Option<UnixListener> {
    use std::os::unix::io::FromRawFd;

    let nfds: i32 = std::env::var("LISTEN_FDS").ok()?.parse().ok()?;
    let pid: i32 = std::env::var("LISTEN_PID").ok()?.parse().ok()?;
    if pid != unsafe { libc::getpid() } || nfds < 1 {
        return None;
    }
    // SAFETY: fd 3 is documented by the activation protocol as the first
    // inherited descriptor; ownership transfers to the returned listener.
    let listener = unsafe { UnixListener::from_raw_fd(3) };
    listener.set_nonblocking(true).ok()?;
    Some(listener)
}
