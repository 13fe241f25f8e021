//! Deterministic test signals shared by unit tests, integration tests and
//! the CLI's offline commands.

pub mod signals;
