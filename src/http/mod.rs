//! HTTP surface of the relay

pub mod middleware;
pub mod protocol;
pub mod routes;

pub use routes::build_router;
