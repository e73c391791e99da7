//! Integration layer - interfaces implemented outside the core.

pub mod server;

pub use server::{BoxedServer, Server};
