use thiserror::Error;

/// The four standard `org.varlink.service` protocol errors, plus the local
/// usage and transport errors a client or server can hit.
#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("interface parse error: {0}")]
    Parse(#[from] varlink_parser::Error),

    #[error("interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("method not implemented: {0}")]
    MethodNotImplemented(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("varlink error reply: {error} {parameters:?}")]
    VarlinkErrorReply {
        error: String,
        parameters: Option<serde_json::Value>,
    },

    #[error("reply carried `continues: true` for a call that did not ask for `more`")]
    CallContinuesMismatch,

    #[error("connection busy with another in-flight call")]
    ConnectionBusy,

    #[error("iterator driven after its reply stream already completed")]
    IteratorExhausted,

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("invalid varlink address: {0}")]
    InvalidAddress(String),

    #[error("{0}")]
    Other(String),
}

/// The four standard protocol errors, carrying the same parameter shape a
/// peer would see on the wire.
impl ErrorKind {
    /// The standard `org.varlink.service.*` error name for this kind, if any.
    pub fn wire_name(&self) -> Option<&'static str> {
        match self {
            ErrorKind::InterfaceNotFound(_) => Some("org.varlink.service.InterfaceNotFound"),
            ErrorKind::InvalidParameter(_) => Some("org.varlink.service.InvalidParameter"),
            ErrorKind::MethodNotFound(_) => Some("org.varlink.service.MethodNotFound"),
            ErrorKind::MethodNotImplemented(_) => Some("org.varlink.service.MethodNotImplemented"),
            _ => None,
        }
    }

    /// The `parameters` object to attach to the wire error, if any.
    pub fn wire_parameters(&self) -> Option<serde_json::Value> {
        match self {
            ErrorKind::InterfaceNotFound(v) => Some(serde_json::json!({ "interface": v })),
            ErrorKind::InvalidParameter(v) => Some(serde_json::json!({ "parameter": v })),
            ErrorKind::MethodNotFound(v) => Some(serde_json::json!({ "method": v })),
            ErrorKind::MethodNotImplemented(v) => Some(serde_json::json!({ "method": v })),
            _ => None,
        }
    }
}

pub type Error = ErrorKind;
pub type Result<T> = std::result::Result<T, Error>;
