//! The schema registry: a name -> [`Interface`] map, pre-seeded with the
//! well-known `org.varlink.service` interface every service must implement.

use crate::error::{ErrorKind, Result};
use std::collections::HashMap;
use varlink_parser::{Interface, Varlink};

/// The literal interface description every varlink service exposes, verbatim
/// text a client can re-parse via `GetInterfaceDescription`.
pub const ORG_VARLINK_SERVICE: &str = "\
## The Varlink Service Interface is provided by every varlink service. It\n\
## describes the service and the interfaces it implements.\n\
interface org.varlink.service\n\
\n\
## Get a list of all the interfaces a service provides and information\n\
## about the implementation.\n\
method GetInfo() -> (\n\
  vendor: string,\n\
  product: string,\n\
  version: string,\n\
  url: string,\n\
  interfaces: string[]\n\
)\n\
\n\
## Get the description of an interface that is implemented by this service.\n\
method GetInterfaceDescription(interface: string) -> (description: string)\n\
\n\
## The requested interface was not found.\n\
error InterfaceNotFound (interface: string)\n\
\n\
## The requested method was not found\n\
error MethodNotFound (method: string)\n\
\n\
## The interface defines the requested method, but the service does not\n\
## implement it.\n\
error MethodNotImplemented (method: string)\n\
\n\
## One of the passed parameters is invalid.\n\
error InvalidParameter (parameter: string)\n\
";

/// Static identity information returned by `GetInfo`.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub vendor: String,
    pub product: String,
    pub version: String,
    pub url: String,
}

/// A read-only, name -> schema map built once at startup.
///
/// `org.varlink.service` is always present. Additional interfaces are added
/// via [`Registry::register`] before the registry is handed to a dispatcher
/// or client.
#[derive(Debug, Default)]
pub struct Registry {
    interfaces: HashMap<String, Interface>,
}

impl Registry {
    pub fn new() -> Self {
        let mut r = Registry {
            interfaces: HashMap::new(),
        };
        r.register_str(ORG_VARLINK_SERVICE)
            .expect("the built-in org.varlink.service description must parse");
        r
    }

    /// Parse `description` and add it to the registry.
    pub fn register_str(&mut self, description: &str) -> Result<()> {
        let v = Varlink::from_string(description).map_err(ErrorKind::Parse)?;
        self.interfaces.insert(v.interface.name.clone(), v.interface);
        Ok(())
    }

    pub fn register(&mut self, interface: Interface) {
        self.interfaces.insert(interface.name.clone(), interface);
    }

    pub fn get(&self, name: &str) -> Option<&Interface> {
        self.interfaces.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.interfaces.keys().cloned().collect();
        names.sort();
        // org.varlink.service is conventionally listed first in GetInfo replies
        if let Some(pos) = names.iter().position(|n| n == "org.varlink.service") {
            let n = names.remove(pos);
            names.insert(0, n);
        }
        names
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_builtin_interface_parses() {
        let r = Registry::new();
        let iface = r.get("org.varlink.service").unwrap();
        assert!(iface.method("GetInfo").is_some());
        assert!(iface.method("GetInterfaceDescription").is_some());
        assert_eq!(iface.error_keys.len(), 4);
    }

    #[test]
    fn test_names_lists_service_first() {
        let mut r = Registry::new();
        r.register_str("interface a.b\nmethod F() -> ()\n").unwrap();
        assert_eq!(r.names()[0], "org.varlink.service");
        assert!(r.names().contains(&"a.b".to_string()));
    }
}
