//! HTTP management API for the whitelist.

mod api;
mod error;
mod handlers;
mod server;

pub use api::*;
pub use error::WebError;
pub use handlers::*;
pub use server::WebServer;
