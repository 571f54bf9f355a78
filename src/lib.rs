//! Layered preference store.
//!
//! Preferences live in three sources (packaged Asset, per-device Local and
//! network Remote), each holding a [`document::Document`]. Values can
//! reference each other with `${Preferences.path}`, command-line arguments
//! can override any path, and the sources are queried in priority order by
//! the [`resolver::Resolver`].
//!
//! This module exports the core components for embedding and testing.

pub mod cli;
pub mod config;
pub mod context;
pub mod crypto;
pub mod document;
pub mod error;
pub mod eval;
pub mod logging;
pub mod overrides;
pub mod remote;
pub mod resolver;
pub mod source;

pub use context::PrefsContext;
pub use document::{Document, Value};
pub use error::{ErrorCode, PrefsError, PrefsResult};
pub use source::{Source, SourceKind};
