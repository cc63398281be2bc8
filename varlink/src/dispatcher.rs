//! Maps an incoming request to a registered handler and produces the
//! resulting reply sequence.
//!
//! Handlers are resolved through an explicit `(interface, method) -> handler`
//! registration table rather than any form of dynamic lookup, and a
//! handler's streamed output is modeled as an explicit iterator object.

use crate::error::ErrorKind;
use crate::filter::filter_params;
use crate::message::Reply;
use crate::schema::{Registry, ServiceInfo};
use std::collections::HashMap;
use std::sync::Arc;

/// What the request asked for, passed to every handler so it can decide
/// whether to honor `more`/`oneway`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallFlags {
    pub more: bool,
    pub oneway: bool,
    pub upgrade: bool,
}

/// A single incoming call, already projected against the method's declared
/// input struct.
pub struct Context {
    pub parameters: serde_json::Value,
    pub flags: CallFlags,
}

/// One element of a streamed reply. `continues = false` marks the terminal
/// reply.
pub struct StreamItem {
    pub parameters: serde_json::Value,
    pub continues: bool,
}

/// What a handler produced.
pub enum HandlerReply {
    /// One reply, terminal by definition.
    Single(serde_json::Value),
    /// A declared protocol error, aborting the call.
    Error { name: String, parameters: Option<serde_json::Value> },
    /// A lazily-produced sequence of replies for a `more` call.
    Stream(Box<dyn Iterator<Item = StreamItem> + Send>),
}

pub type Handler = Arc<dyn Fn(Context) -> HandlerReply + Send + Sync>;

/// Registration-table dispatcher: `(interface, method) -> handler`.
pub struct Dispatcher {
    registry: Registry,
    handlers: HashMap<(String, String), Handler>,
    info: ServiceInfo,
}

/// The reply sequence produced by dispatching one request: zero frames for
/// oneway calls, one frame for ordinary calls, or many for streaming calls.
pub enum Replies {
    One(Reply),
    None,
    Many(Box<dyn Iterator<Item = Reply> + Send>),
}

impl Dispatcher {
    pub fn new(info: ServiceInfo) -> Self {
        Dispatcher {
            registry: Registry::new(),
            handlers: HashMap::new(),
            info,
        }
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register the handler for `interface.Method`. The interface must
    /// already be registered in the schema registry.
    pub fn register_handler(
        &mut self,
        interface: &str,
        method: &str,
        handler: impl Fn(Context) -> HandlerReply + Send + Sync + 'static,
    ) {
        self.handlers.insert(
            (interface.to_string(), method.to_string()),
            Arc::new(handler),
        );
    }

    /// Run the dispatch algorithm against one decoded request, producing the
    /// reply sequence to write back to the connection.
    pub fn dispatch(
        &self,
        method: &str,
        parameters: Option<serde_json::Value>,
        flags: CallFlags,
    ) -> Replies {
        let (interface_name, method_name) = match method.rfind('.') {
            Some(idx) if idx > 0 && idx + 1 < method.len() => {
                (&method[..idx], &method[idx + 1..])
            }
            _ => {
                return Replies::One(Reply::error(
                    "org.varlink.service.InterfaceNotFound",
                    Some(serde_json::json!({ "interface": method })),
                ))
            }
        };

        if interface_name == "org.varlink.service" {
            return self.dispatch_builtin(method_name, parameters);
        }

        let interface = match self.registry.get(interface_name) {
            Some(i) => i,
            None => {
                return Replies::One(Reply::error(
                    "org.varlink.service.InterfaceNotFound",
                    Some(serde_json::json!({ "interface": interface_name })),
                ))
            }
        };

        let decl = match interface.method(method_name) {
            Some(m) => m,
            None => {
                return Replies::One(Reply::error(
                    "org.varlink.service.MethodNotFound",
                    Some(serde_json::json!({ "method": method_name })),
                ))
            }
        };

        let params = parameters.unwrap_or_else(|| serde_json::json!({}));
        if let serde_json::Value::Object(map) = &params {
            let declared: std::collections::HashSet<&str> =
                decl.input.fields.iter().map(|f| f.name.as_str()).collect();
            for key in map.keys() {
                if !declared.contains(key.as_str()) {
                    return Replies::One(Reply::error(
                        "org.varlink.service.InvalidParameter",
                        Some(serde_json::json!({ "parameter": key })),
                    ));
                }
            }
        }
        let projected = filter_params(&params, &decl.input, interface);

        let handler = match self
            .handlers
            .get(&(interface_name.to_string(), method_name.to_string()))
        {
            Some(h) => h,
            None => {
                return Replies::One(Reply::error(
                    "org.varlink.service.MethodNotImplemented",
                    Some(serde_json::json!({ "method": method_name })),
                ))
            }
        };

        let ctx = Context {
            parameters: projected,
            flags,
        };

        let reply = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(ctx)));
        let reply = match reply {
            Ok(r) => r,
            Err(_) => {
                log::error!("internal fault while handling {}", method);
                return Replies::One(Reply::error("InternalError", None));
            }
        };

        match reply {
            HandlerReply::Single(params) => {
                if flags.oneway {
                    Replies::None
                } else {
                    Replies::One(Reply::parameters(params))
                }
            }
            HandlerReply::Error { name, parameters } => {
                if flags.oneway {
                    Replies::None
                } else {
                    Replies::One(Reply::error(name, parameters))
                }
            }
            HandlerReply::Stream(iter) => {
                if flags.oneway {
                    // a oneway call elicits no reply; drain the stream so the
                    // handler still runs to completion, then discard it
                    iter.for_each(drop);
                    Replies::None
                } else {
                    Replies::Many(Box::new(iter.map(|item| {
                        let mut reply = Reply::parameters(item.parameters);
                        if item.continues {
                            reply.continues = Some(true);
                        }
                        reply
                    })))
                }
            }
        }
    }

    fn dispatch_builtin(
        &self,
        method_name: &str,
        parameters: Option<serde_json::Value>,
    ) -> Replies {
        match method_name {
            "GetInfo" => Replies::One(Reply::parameters(serde_json::json!({
                "vendor": self.info.vendor,
                "product": self.info.product,
                "version": self.info.version,
                "url": self.info.url,
                "interfaces": self.registry.names(),
            }))),
            "GetInterfaceDescription" => {
                let interface = parameters
                    .as_ref()
                    .and_then(|p| p.get("interface"))
                    .and_then(|v| v.as_str());
                match interface {
                    None => Replies::One(Reply::error(
                        "org.varlink.service.InvalidParameter",
                        Some(serde_json::json!({ "parameter": "interface" })),
                    )),
                    Some(name) => match self.registry.get(name) {
                        Some(i) => {
                            use varlink_parser::Format;
                            Replies::One(Reply::parameters(serde_json::json!({
                                "description": i.get_multiline(0, 80),
                            })))
                        }
                        None => Replies::One(Reply::error(
                            "org.varlink.service.InterfaceNotFound",
                            Some(serde_json::json!({ "interface": name })),
                        )),
                    },
                }
            }
            _ => Replies::One(Reply::error(
                "org.varlink.service.MethodNotFound",
                Some(serde_json::json!({ "method": method_name })),
            )),
        }
    }
}

impl From<ErrorKind> for HandlerReply {
    fn from(e: ErrorKind) -> Self {
        match e.wire_name() {
            Some(name) => HandlerReply::Error {
                name: name.to_string(),
                parameters: e.wire_parameters(),
            },
            None => {
                log::error!("handler returned unexpected error: {}", e);
                HandlerReply::Error {
                    name: "InternalError".to_string(),
                    parameters: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn svc() -> Dispatcher {
        Dispatcher::new(ServiceInfo {
            vendor: "Example".into(),
            product: "Test".into(),
            version: "1".into(),
            url: "https://example.com".into(),
        })
    }

    #[test]
    fn test_unknown_interface() {
        let d = svc();
        match d.dispatch("com.example.Unknown.Foo", None, CallFlags::default()) {
            Replies::One(r) => {
                assert_eq!(r.error.as_deref(), Some("org.varlink.service.InterfaceNotFound"));
            }
            _ => panic!("expected single reply"),
        }
    }

    #[test]
    fn test_malformed_method_name() {
        let d = svc();
        match d.dispatch("noDotHere", None, CallFlags::default()) {
            Replies::One(r) => {
                assert_eq!(r.error.as_deref(), Some("org.varlink.service.InterfaceNotFound"));
            }
            _ => panic!("expected single reply"),
        }
    }

    #[test]
    fn test_get_info() {
        let d = svc();
        match d.dispatch("org.varlink.service.GetInfo", None, CallFlags::default()) {
            Replies::One(r) => {
                let params = r.parameters.unwrap();
                assert_eq!(params["vendor"], "Example");
                assert_eq!(params["interfaces"][0], "org.varlink.service");
            }
            _ => panic!("expected single reply"),
        }
    }

    #[test]
    fn test_method_not_found() {
        let mut d = svc();
        d.registry_mut()
            .register_str("interface a.b\nmethod F() -> ()\n")
            .unwrap();
        match d.dispatch("a.b.NoSuchMethod", None, CallFlags::default()) {
            Replies::One(r) => {
                assert_eq!(r.error.as_deref(), Some("org.varlink.service.MethodNotFound"));
            }
            _ => panic!("expected single reply"),
        }
    }

    #[test]
    fn test_invalid_parameter() {
        let mut d = svc();
        d.registry_mut()
            .register_str("interface a.b\nmethod Echo(msg: string) -> (msg: string)\n")
            .unwrap();
        d.register_handler("a.b", "Echo", |ctx| HandlerReply::Single(ctx.parameters));
        match d.dispatch(
            "a.b.Echo",
            Some(serde_json::json!({"bogus": 1})),
            CallFlags::default(),
        ) {
            Replies::One(r) => {
                assert_eq!(r.error.as_deref(), Some("org.varlink.service.InvalidParameter"));
                assert_eq!(r.parameters.unwrap()["parameter"], "bogus");
            }
            _ => panic!("expected single reply"),
        }
    }

    #[test]
    fn test_method_not_implemented() {
        let mut d = svc();
        d.registry_mut()
            .register_str("interface a.b\nmethod F() -> ()\n")
            .unwrap();
        match d.dispatch("a.b.F", None, CallFlags::default()) {
            Replies::One(r) => assert_eq!(
                r.error.as_deref(),
                Some("org.varlink.service.MethodNotImplemented")
            ),
            _ => panic!("expected single reply"),
        }
    }

    #[test]
    fn test_streaming_reply() {
        let mut d = svc();
        d.registry_mut()
            .register_str("interface a.b\nmethod Count() -> (n: int)\n")
            .unwrap();
        d.register_handler("a.b", "Count", |_ctx| {
            HandlerReply::Stream(Box::new(
                (0..3)
                    .map(|n| StreamItem {
                        parameters: serde_json::json!({ "n": n }),
                        continues: n < 2,
                    }),
            ))
        });
        match d.dispatch(
            "a.b.Count",
            None,
            CallFlags { more: true, ..Default::default() },
        ) {
            Replies::Many(iter) => {
                let replies: Vec<_> = iter.collect();
                assert_eq!(replies.len(), 3);
                assert_eq!(replies[0].continues, Some(true));
                assert_eq!(replies[2].continues, None);
            }
            _ => panic!("expected streaming reply"),
        }
    }

    #[test]
    fn test_oneway_discards_stream() {
        let mut d = svc();
        d.registry_mut()
            .register_str("interface a.b\nmethod Count() -> (n: int)\n")
            .unwrap();
        d.register_handler("a.b", "Count", |_ctx| {
            HandlerReply::Stream(Box::new((0..5).map(|n| StreamItem {
                parameters: serde_json::json!({ "n": n }),
                continues: n < 4,
            })))
        });
        match d.dispatch(
            "a.b.Count",
            None,
            CallFlags { oneway: true, ..Default::default() },
        ) {
            Replies::None => {}
            _ => panic!("expected no replies for oneway"),
        }
    }
}
