//! Address parsing and the transport abstraction a connection is built on.
//!
//! Parsing strips the `unix:` scheme, splits off an optional `;mode=`
//! suffix, and turns a leading `@` into an abstract-socket NUL prefix on
//! platforms that support it.

use crate::error::{ErrorKind, Result};
use std::io::{Read, Write};

/// A parsed varlink address, one of the forms described in the address
/// syntax: `unix:<path>[;mode=<octal>]`, `unix:@<name>`, or `exec:<program>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Address {
    /// A filesystem or abstract unix domain socket.
    Unix { path: String, mode: Option<u32> },
    /// A process to launch that inherits a bound listening socket on fd 3.
    /// Actually spawning the child is left to a caller-supplied transport;
    /// the core only parses and carries this variant.
    Exec { program: String },
}

impl Address {
    pub fn parse(address: &str) -> Result<Address> {
        if let Some(rest) = address.strip_prefix("unix:") {
            let (path, mode) = match rest.rfind(";mode=") {
                Some(idx) => {
                    let mode = u32::from_str_radix(&rest[idx + ";mode=".len()..], 8)
                        .map_err(|_| ErrorKind::InvalidAddress(address.to_string()))?;
                    (rest[..idx].to_string(), Some(mode))
                }
                None => (rest.to_string(), None),
            };
            if path.is_empty() {
                return Err(ErrorKind::InvalidAddress(address.to_string()));
            }
            let path = if let Some(name) = path.strip_prefix('@') {
                format!("\0{}", name)
            } else {
                path
            };
            Ok(Address::Unix { path, mode })
        } else if let Some(program) = address.strip_prefix("exec:") {
            if program.is_empty() {
                return Err(ErrorKind::InvalidAddress(address.to_string()));
            }
            Ok(Address::Exec {
                program: program.to_string(),
            })
        } else {
            Err(ErrorKind::InvalidAddress(address.to_string()))
        }
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self, Address::Unix { path, .. } if path.starts_with('\0'))
    }
}

/// A connected, full-duplex byte stream. Implemented for `UnixStream` by the
/// default unix transport; `exec:` spawning a child that binds its own
/// listening socket is a caller responsibility, not something this trait
/// performs itself.
pub trait Stream: Read + Write + Send {
    fn try_clone_stream(&self) -> std::io::Result<Box<dyn Stream>>;
    fn shutdown(&self) -> std::io::Result<()>;
    fn set_nonblocking(&self, nonblocking: bool) -> std::io::Result<()>;
}

/// Connects an [`Address`] to a live [`Stream`]. The built-in implementation
/// handles `unix:`; a caller embedding the `exec:` process-launch glue
/// provides its own `Transport` for that variant.
pub trait Transport {
    fn connect(&self, address: &Address) -> Result<Box<dyn Stream>>;
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::os::unix::io::{AsRawFd, RawFd};
    use std::os::unix::net::UnixStream;

    impl Stream for UnixStream {
        fn try_clone_stream(&self) -> std::io::Result<Box<dyn Stream>> {
            Ok(Box::new(self.try_clone()?))
        }

        fn shutdown(&self) -> std::io::Result<()> {
            UnixStream::shutdown(self, std::net::Shutdown::Both)
        }

        fn set_nonblocking(&self, nonblocking: bool) -> std::io::Result<()> {
            UnixStream::set_nonblocking(self, nonblocking)
        }
    }

    /// The default transport: connects `unix:` addresses via `UnixStream`,
    /// including abstract sockets (a path beginning with NUL).
    #[derive(Debug, Default, Clone, Copy)]
    pub struct UnixTransport;

    impl Transport for UnixTransport {
        fn connect(&self, address: &Address) -> Result<Box<dyn Stream>> {
            match address {
                Address::Unix { path, .. } => {
                    let stream = connect_unix_path(path)?;
                    Ok(Box::new(stream))
                }
                Address::Exec { program } => Err(ErrorKind::Other(format!(
                    "exec transport not implemented by the core; spawn `{}` and connect \
                     a caller-supplied Transport instead",
                    program
                ))),
            }
        }
    }

    fn connect_unix_path(path: &str) -> Result<UnixStream> {
        if let Some(name) = path.strip_prefix('\0') {
            connect_abstract(name)
        } else {
            UnixStream::connect(path).map_err(ErrorKind::Io)
        }
    }

    #[cfg(target_os = "linux")]
    fn connect_abstract(name: &str) -> Result<UnixStream> {
        use std::os::unix::io::FromRawFd;

        let mut addr: libc::sockaddr_un = unsafe { std::mem::zeroed() };
        addr.sun_family = libc::AF_UNIX as libc::sa_family_t;
        let bytes = name.as_bytes();
        if bytes.len() + 1 > addr.sun_path.len() - 1 {
            return Err(ErrorKind::InvalidAddress(name.to_string()));
        }
        // sun_path[0] stays 0 for the abstract namespace
        for (i, b) in bytes.iter().enumerate() {
            addr.sun_path[i + 1] = *b as libc::c_char;
        }
        let len = 1 + 1 + bytes.len();

        unsafe {
            let fd = libc::socket(libc::AF_UNIX, libc::SOCK_STREAM, 0);
            if fd < 0 {
                return Err(ErrorKind::Io(std::io::Error::last_os_error()));
            }
            let ret = libc::connect(
                fd,
                &addr as *const _ as *const libc::sockaddr,
                len as libc::socklen_t,
            );
            if ret < 0 {
                let err = std::io::Error::last_os_error();
                libc::close(fd);
                return Err(ErrorKind::Io(err));
            }
            Ok(UnixStream::from_raw_fd(fd))
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn connect_abstract(_name: &str) -> Result<UnixStream> {
        Err(ErrorKind::Other(
            "abstract unix sockets are only supported on linux".into(),
        ))
    }

    #[allow(dead_code)]
    fn raw_fd(s: &UnixStream) -> RawFd {
        s.as_raw_fd()
    }
}

#[cfg(unix)]
pub use unix::UnixTransport;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_unix_path() {
        let a = Address::parse("unix:/run/foo.sock").unwrap();
        assert_eq!(
            a,
            Address::Unix {
                path: "/run/foo.sock".into(),
                mode: None
            }
        );
    }

    #[test]
    fn test_parse_unix_with_mode() {
        let a = Address::parse("unix:/run/foo.sock;mode=0600").unwrap();
        assert_eq!(
            a,
            Address::Unix {
                path: "/run/foo.sock".into(),
                mode: Some(0o600)
            }
        );
    }

    #[test]
    fn test_parse_abstract() {
        let a = Address::parse("unix:@foo").unwrap();
        match a {
            Address::Unix { path, .. } => assert_eq!(path, "\0foo"),
            _ => panic!("expected unix address"),
        }
    }

    #[test]
    fn test_parse_exec() {
        let a = Address::parse("exec:/usr/bin/myservice").unwrap();
        assert_eq!(
            a,
            Address::Exec {
                program: "/usr/bin/myservice".into()
            }
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Address::parse("tcp:127.0.0.1:1234").is_err());
        assert!(Address::parse("unix:").is_err());
        assert!(Address::parse("garbage").is_err());
    }
}
