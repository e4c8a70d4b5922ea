//! External interfaces (spec.md §6): the HTTP hook surface and status API,
//! the MCP tool server, and the optional cloud relay client. Everything in
//! this crate is a thin transport shell over `oak-ci-application`'s use
//! cases; no business logic lives here.

pub mod http;
pub mod mcp;
pub mod relay;

pub use http::{build_router, AppState, DaemonStatus};
