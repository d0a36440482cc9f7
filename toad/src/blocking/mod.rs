/// A blocking CoAP request client
pub mod client;

/// A blocking CoAP server
pub mod server;

#[doc(inline)]
pub use client::{Client, ClientConfig};
#[doc(inline)]
pub use server::Server;
