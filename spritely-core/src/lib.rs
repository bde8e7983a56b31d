#![warn(clippy::pedantic)]

pub mod backup;
pub mod commands;
pub mod context;
pub mod doc_api;
pub mod document;
pub mod history;
pub mod id;
pub mod range;
pub mod range_ops;
pub mod sprite;
pub mod transaction;
pub mod tx;

pub use context::Context;
pub use document::{DocAccessError, DocReader, DocWriter, Document, DocumentID};
