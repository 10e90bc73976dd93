//! Network Module
//!
//! HTTP server and request handling.
//!
//! ## Architecture
//! - Single acceptor thread
//! - Bounded worker pool serving one request per connection
//! - Requests routed through the Gateway into the Engine

mod connection;
mod gateway;
mod server;

pub use connection::RequestContext;
pub use gateway::{Gateway, Route};
pub use server::{Server, ShutdownHandle};
