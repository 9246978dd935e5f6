//! Sandboxed single-resource HTTP fetch worker.
//!
//! A worker process applies its platform [`sandbox`] exactly once, then runs
//! one [`session::FetchSession`] over a [`transport::Transport`] and reports a
//! [`outcome::FetchOutcome`] through its exit code.

pub mod config;
pub mod logging;

pub mod outcome;
pub mod output;
pub mod request;
pub mod sandbox;
pub mod session;
pub mod transport;
pub mod worker;

pub use outcome::{FetchOutcome, FetchResult, TransportErrorKind};
pub use request::FetchRequest;
pub use worker::run_worker;
