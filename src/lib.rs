//! `jsh`: a small job-control shell.
//!
//! Runs external programs in the foreground or background, wires a single
//! two-stage pipeline, redirects stdin/stdout to files, keeps a table of
//! spawned processes and a short history of entered lines.

pub mod builtin;
pub mod error;
pub mod eval;
pub mod global;
pub mod history;
pub mod job;
pub mod parser;
pub mod pipeline;
pub mod redirect;
pub mod search;
pub mod types;

pub use eval::{dispatch, eval_line};
pub use global::State;
