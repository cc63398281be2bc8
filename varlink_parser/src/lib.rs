/*!
 varlink_parser crate for parsing [varlink](http://varlink.org) interface definition files.

 # Examples

 ```rust
 use varlink_parser::Varlink;
 let v = Varlink::from_string("
 ## The Varlink Service Interface is provided by every varlink service. It
 ## describes the service and the interfaces it implements.
 interface org.varlink.service

 ## Get a list of all the interfaces a service provides and information
 ## about the implementation.
 method GetInfo() -> (
 vendor: string,
 product: string,
 version: string,
 url: string,
 interfaces: []string
 )

 ## Get the description of an interface that is implemented by this service.
 method GetInterfaceDescription(interface: string) -> (description: string)

 ## The requested interface was not found.
 error InterfaceNotFound (interface: string)

 ## The requested method was not found
 error MethodNotFound (method: string)

 ## The interface defines the requested method, but the service does not
 ## implement it.
 error MethodNotImplemented (method: string)

 ## One of the passed parameters is invalid.
 error InvalidParameter (parameter: string)
 ").unwrap();
 assert_eq!(v.interface.name, "org.varlink.service");
 ```
!*/

mod error;
mod format;
mod grammar;
mod model;

#[cfg(test)]
mod test;

pub use crate::error::{Error, Result};
pub use crate::format::Format;
pub use crate::model::{Alias, Field, Interface, Method, TypeExpr, VError, VStruct};

/// A parsed interface description together with the source text it was parsed from.
pub struct Varlink {
    pub description: String,
    pub interface: Interface,
}

impl Varlink {
    /// Parse an interface description, the textual form a service returns from
    /// `org.varlink.service.GetInterfaceDescription`.
    pub fn from_string<S: ?Sized + AsRef<str>>(s: &S) -> Result<Self> {
        let s = s.as_ref();
        let interface = grammar::parse(s)?;
        Ok(Varlink {
            description: s.to_string(),
            interface,
        })
    }
}
