//! linesync Core - Operational Transform Engine and Document Management
//!
//! This crate provides the core functionality for linesync:
//! - Line and content operations over plain text documents
//! - Patch reconciliation against concurrent history
//! - A document store serializing mutations per document
//! - The editor service tying the two together

pub mod document;
pub mod error;
pub mod operation;
pub mod service;
pub mod store;
pub mod text;
pub mod transform;

pub use document::{Commit, Document, DocumentId, Patch};
pub use error::{Error, Result};
pub use operation::{ContentOperation, Operation};
pub use service::{Applied, ContentSnapshot, Diff, EditorService, JournalEntry, ServiceStats};
pub use store::DocumentStore;
pub use transform::{reconcile, Reconciled};
