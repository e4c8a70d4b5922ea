//! Infrastructure-facing facades that the domain crate exposes without
//! taking a dependency on any concrete infrastructure crate.

pub mod logging;
