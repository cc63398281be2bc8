/*!
[Server](server) and [client](client) support for the
[varlink protocol](http://varlink.org).

# Server

Describe a service's interfaces as varlink IDL text, register handlers for
each method, and hand the result to a [`Server`]:

```no_run
use varlink::dispatcher::{CallFlags, Context, Dispatcher, HandlerReply};
use varlink::schema::ServiceInfo;
use varlink::server::{Server, ServerConfig};

let mut dispatcher = Dispatcher::new(ServiceInfo {
    vendor: "Example".into(),
    product: "Ping Service".into(),
    version: "1".into(),
    url: "https://example.com".into(),
});
dispatcher
    .registry_mut()
    .register_str("interface org.example.ping\nmethod Ping(ping: string) -> (pong: string)\n")
    .unwrap();
dispatcher.register_handler("org.example.ping", "Ping", |ctx: Context| {
    HandlerReply::Single(serde_json::json!({ "pong": ctx.parameters["ping"] }))
});

let mut server = Server::bind("unix:/run/org.example.ping", dispatcher, ServerConfig::default()).unwrap();
server.run().unwrap();
```

# Client

```no_run
use varlink::client::Client;

let mut client = Client::connect("unix:/run/org.example.ping").unwrap();
let reply = client.call("org.example.ping.Ping", serde_json::json!({"ping": "hi"})).unwrap();
assert_eq!(reply["pong"], "hi");
```

# Addresses

Services are named with the addresses described in the varlink address
syntax: `unix:<path>[;mode=<octal>]`, `unix:@<name>` for an abstract socket,
or `exec:<program>` for a service that is launched on demand and inherits a
bound listening socket on file descriptor 3. See [`address`].
*/

pub mod address;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod message;
pub mod schema;

#[cfg(unix)]
pub mod client;
#[cfg(unix)]
pub mod server;

pub use error::{Error, ErrorKind, Result};

pub use varlink_parser::{Interface, Varlink};
