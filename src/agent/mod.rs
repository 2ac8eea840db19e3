//! Proxy core
//!
//! Components for serving a filtered SSH agent socket:
//! - `filter`: the stateless forward/reject decision for client requests
//! - `upstream`: connection to the upstream SSH agent
//! - `session`: one client connection's bidirectional shuttle
//! - `server`: the listening socket spawning sessions

pub mod filter;

mod server;
mod session;
mod upstream;

pub use filter::{Decision, RejectReason};
pub use server::Server;
pub use session::Session;
pub use upstream::Upstream;
