//! The client side: issuing calls, enforcing the single-in-flight
//! discipline, and exposing streaming replies as a lazy [`Iterator`].
//!
//! A connection carries at most one outstanding call at a time. This client
//! is purely blocking (no readiness loop to defer to between a request and
//! its reply), so it keeps its own small buffer rather than going through
//! the non-blocking [`crate::connection::Connection`] the server's event
//! loop drives.

use crate::address::{Address, Stream, Transport, UnixTransport};
use crate::error::{ErrorKind, Result};
use crate::filter::filter_params;
use crate::message::{parse_message, serialize_request, ParseResult, Reply, Request};
use crate::schema::Registry;
use std::io::{Read, Write};

/// A connected varlink client. Constructing one performs the bootstrap
/// sequence: call `GetInfo`, then `GetInterfaceDescription` for every
/// interface the service lists, building a local schema registry.
pub struct Client {
    stream: Box<dyn Stream>,
    recv_buf: Vec<u8>,
    in_use: bool,
    pub registry: Registry,
}

impl Client {
    /// Connect to `address` using the default unix transport and run the
    /// bootstrap handshake.
    pub fn connect(address: &str) -> Result<Self> {
        let addr = Address::parse(address)?;
        Self::connect_with(&addr, &UnixTransport)
    }

    /// Connect using a caller-supplied transport, for `exec:` addresses or
    /// test doubles.
    pub fn connect_with(addr: &Address, transport: &dyn Transport) -> Result<Self> {
        let stream = transport.connect(addr)?;
        stream.set_nonblocking(false).map_err(ErrorKind::Io)?;
        let mut client = Client {
            stream,
            recv_buf: Vec::new(),
            in_use: false,
            registry: Registry::new(),
        };
        client.bootstrap()?;
        Ok(client)
    }

    fn bootstrap(&mut self) -> Result<()> {
        let info = self.call_raw("org.varlink.service.GetInfo", None)?;
        let interfaces = info
            .get("interfaces")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        for iface in interfaces {
            let name = match iface.as_str() {
                Some(n) if n != "org.varlink.service" => n,
                _ => continue,
            };
            let reply = self.call_raw(
                "org.varlink.service.GetInterfaceDescription",
                Some(serde_json::json!({ "interface": name })),
            )?;
            if let Some(description) = reply.get("description").and_then(|v| v.as_str()) {
                self.registry.register_str(description)?;
            }
        }
        Ok(())
    }

    /// A single-reply call: send the request, block for exactly one frame.
    pub fn call(&mut self, method: &str, parameters: serde_json::Value) -> Result<serde_json::Value> {
        self.call_raw(method, Some(parameters))
    }

    fn call_raw(
        &mut self,
        method: &str,
        parameters: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        self.send(method, parameters, false, false)?;
        let reply = self.recv_one()?;
        if reply.continues == Some(true) {
            // the peer is violating the protocol it agreed to by not asking
            // for `more`; the connection can no longer be trusted to frame
            // replies correctly, so close it rather than leave it busy
            self.close_for_protocol_violation();
            return Err(ErrorKind::CallContinuesMismatch);
        }
        self.in_use = false;
        reply_to_result(reply)
    }

    fn close_for_protocol_violation(&mut self) {
        let _ = self.stream.shutdown();
        self.in_use = false;
    }

    /// A streaming (`more`) call: returns an iterator that yields one
    /// `Result<Value>` per reply frame, stopping after the frame that omits
    /// `continues: true`. Abandoning the iterator early leaves the
    /// connection busy for further calls until a final non-continuing frame
    /// is drained, since the protocol carries no cancel frame.
    pub fn call_more(&mut self, method: &str, parameters: serde_json::Value) -> Result<MoreReplies<'_>> {
        self.send(method, Some(parameters), true, false)?;
        Ok(MoreReplies {
            client: self,
            done: false,
        })
    }

    /// A call that elicits no reply at all.
    pub fn call_oneway(&mut self, method: &str, parameters: serde_json::Value) -> Result<()> {
        self.send(method, Some(parameters), false, true)
    }

    fn send(
        &mut self,
        method: &str,
        parameters: Option<serde_json::Value>,
        more: bool,
        oneway: bool,
    ) -> Result<()> {
        if self.in_use {
            return Err(ErrorKind::ConnectionBusy);
        }

        let (interface_name, method_name) = split_method(method)?;
        let interface = self
            .registry
            .get(interface_name)
            .ok_or_else(|| ErrorKind::InterfaceNotFound(interface_name.to_string()))?;
        let decl = interface
            .method(method_name)
            .ok_or_else(|| ErrorKind::MethodNotFound(method_name.to_string()))?;
        let raw = parameters.unwrap_or_else(|| serde_json::json!({}));
        let filtered = filter_params(&raw, &decl.input, interface);

        let mut req = Request::new(method.to_string(), Some(filtered));
        if more {
            req.more = Some(true);
        }
        if oneway {
            req.oneway = Some(true);
        }
        let bytes = serialize_request(&req)?;
        self.stream.write_all(&bytes).map_err(ErrorKind::Io)?;
        if !oneway {
            self.in_use = true;
        }
        Ok(())
    }

    fn recv_one(&mut self) -> Result<Reply> {
        loop {
            if let ParseResult::Complete { payload, consumed } = parse_message(&self.recv_buf) {
                let reply: Reply = serde_json::from_slice(payload).map_err(ErrorKind::SerdeJson)?;
                self.recv_buf.drain(..consumed);
                return Ok(reply);
            }
            let mut chunk = [0u8; 8192];
            let n = self.stream.read(&mut chunk).map_err(ErrorKind::Io)?;
            if n == 0 {
                return Err(ErrorKind::ConnectionClosed);
            }
            self.recv_buf.extend_from_slice(&chunk[..n]);
        }
    }
}

/// Split `interface.Method` into its two parts, the same convention the
/// dispatcher uses to route an incoming call.
fn split_method(method: &str) -> Result<(&str, &str)> {
    match method.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < method.len() => Ok((&method[..idx], &method[idx + 1..])),
        _ => Err(ErrorKind::InterfaceNotFound(method.to_string())),
    }
}

fn reply_to_result(reply: Reply) -> Result<serde_json::Value> {
    match reply.error {
        Some(name) => Err(ErrorKind::VarlinkErrorReply {
            error: name,
            parameters: reply.parameters,
        }),
        None => Ok(reply.parameters.unwrap_or(serde_json::json!({}))),
    }
}

/// Lazy sequence of replies for a `more` call. Iteration stops once a frame
/// without `continues: true` arrives.
pub struct MoreReplies<'a> {
    client: &'a mut Client,
    done: bool,
}

impl Iterator for MoreReplies<'_> {
    type Item = Result<serde_json::Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.client.recv_one() {
            Ok(reply) => {
                if reply.continues != Some(true) {
                    self.done = true;
                    self.client.in_use = false;
                }
                Some(reply_to_result(reply))
            }
            Err(e) => {
                self.done = true;
                self.client.in_use = false;
                Some(Err(e))
            }
        }
    }
}
