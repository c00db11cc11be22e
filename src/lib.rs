//! An interactive command-line shell for POSIX systems.
//!
//! This crate covers the path from keystroke to process tree: a raw-mode
//! line editor with tab completion and history, a two-stage parser (scanner
//! plus recursive-descent grammar) for a miniature shell language with
//! quoting, redirection and pipelines, and an evaluator that realizes
//! pipelines and redirections with pipes, forked children and duplicated
//! descriptors.
//!
//! The main entry point is [`Interpreter`], which owns the session state
//! and drives the read-scan-parse-execute cycle. The public modules
//! [`command`] and [`env`] expose the execution contract and the session
//! environment for embedding and for tests.

mod builtin;
pub mod command;
mod complete;
mod editor;
pub mod env;
mod external;
mod interpreter;
mod io_adapters;
mod lexer;
mod parser;
mod tty;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API.
pub use interpreter::Interpreter;
