//! NUL-terminated JSON framing: the wire format shared by requests and replies.

use crate::error::{ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// A request frame, `{"method": "iface.Method", "parameters": {...}, ...}`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Request<'a> {
    pub method: Cow<'a, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub more: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oneway: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade: Option<bool>,
}

impl<'a> Request<'a> {
    pub fn new(method: impl Into<Cow<'a, str>>, parameters: Option<serde_json::Value>) -> Self {
        Request {
            method: method.into(),
            parameters,
            more: None,
            oneway: None,
            upgrade: None,
        }
    }

    pub fn wants_more(&self) -> bool {
        self.more.unwrap_or(false)
    }

    pub fn is_oneway(&self) -> bool {
        self.oneway.unwrap_or(false)
    }

    pub fn is_upgrade(&self) -> bool {
        self.upgrade.unwrap_or(false)
    }
}

/// A reply frame. Either `{"parameters": {...}}` or `{"error": "...", "parameters": {...}}`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continues: Option<bool>,
}

impl Reply {
    pub fn parameters(parameters: serde_json::Value) -> Self {
        Reply {
            parameters: Some(parameters),
            error: None,
            continues: None,
        }
    }

    pub fn error(name: impl Into<String>, parameters: Option<serde_json::Value>) -> Self {
        Reply {
            parameters,
            error: Some(name.into()),
            continues: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// The outcome of scanning a buffer for one complete NUL-terminated frame.
pub enum ParseResult<'a> {
    /// A full frame was found; `consumed` bytes (including the NUL) should be
    /// drained from the front of the buffer.
    Complete { payload: &'a [u8], consumed: usize },
    /// No NUL byte yet; caller should wait for more input.
    Incomplete,
}

/// Scan `buf` for the next NUL-terminated frame without allocating.
pub fn parse_message(buf: &[u8]) -> ParseResult<'_> {
    match buf.iter().position(|&b| b == 0) {
        Some(pos) => ParseResult::Complete {
            payload: &buf[..pos],
            consumed: pos + 1,
        },
        None => ParseResult::Incomplete,
    }
}

pub fn parse_request(payload: &[u8]) -> Result<Request<'static>> {
    let req: Request<'_> = serde_json::from_slice(payload).map_err(ErrorKind::SerdeJson)?;
    Ok(Request {
        method: Cow::Owned(req.method.into_owned()),
        parameters: req.parameters,
        more: req.more,
        oneway: req.oneway,
        upgrade: req.upgrade,
    })
}

pub fn parse_reply(payload: &[u8]) -> Result<Reply> {
    serde_json::from_slice(payload).map_err(ErrorKind::SerdeJson)
}

pub fn serialize_request(req: &Request<'_>) -> Result<Vec<u8>> {
    let mut buf = serde_json::to_vec(req).map_err(ErrorKind::SerdeJson)?;
    buf.push(0);
    Ok(buf)
}

pub fn serialize_reply(reply: &Reply) -> Result<Vec<u8>> {
    let mut buf = serde_json::to_vec(reply).map_err(ErrorKind::SerdeJson)?;
    buf.push(0);
    Ok(buf)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_complete_frame() {
        let buf = b"{}\0trailing";
        match parse_message(buf) {
            ParseResult::Complete { payload, consumed } => {
                assert_eq!(payload, b"{}");
                assert_eq!(consumed, 3);
            }
            ParseResult::Incomplete => panic!("expected complete"),
        }
    }

    #[test]
    fn test_incomplete_frame() {
        let buf = b"{\"method\":";
        assert!(matches!(parse_message(buf), ParseResult::Incomplete));
    }

    #[test]
    fn test_request_roundtrip() {
        let req = Request::new("org.example.Ping", Some(serde_json::json!({"msg": "hi"})));
        let bytes = serialize_request(&req).unwrap();
        assert_eq!(*bytes.last().unwrap(), 0);
        let payload = &bytes[..bytes.len() - 1];
        let parsed = parse_request(payload).unwrap();
        assert_eq!(parsed.method, "org.example.Ping");
    }

    #[test]
    fn test_reply_with_continues() {
        let reply = Reply::parameters(serde_json::json!({"n": 1})).clone();
        let mut reply = reply;
        reply.continues = Some(true);
        let bytes = serialize_reply(&reply).unwrap();
        let parsed = parse_reply(&bytes[..bytes.len() - 1]).unwrap();
        assert_eq!(parsed.continues, Some(true));
        assert!(!parsed.is_error());
    }

    #[test]
    fn test_error_reply() {
        let reply = Reply::error(
            "org.varlink.service.InvalidParameter",
            Some(serde_json::json!({"parameter": "x"})),
        );
        assert!(reply.is_error());
    }
}
