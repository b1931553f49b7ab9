//! IRC protocol layer: message codec, parameter schemas, builders, and the
//! client connection lifecycle.

pub mod builders;
pub mod client;
pub mod message;
pub mod schema;

pub use client::{Client, ClientError, ClientOptions, ConnectionState};
pub use message::{BuildError, Message, ParseError, Prefix};
