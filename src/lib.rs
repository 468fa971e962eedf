//! `mimetree`: a byte-accurate MIME decoder.
//!
//! Raw RFC 5322 payloads are normalized, split into zero-copy line indexes,
//! and built into a recursive tree of header/body parts that can be queried
//! for a renderable body or an inline attachment.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;

pub use error::{MimeError, Result};
pub use model::message::Message;
pub use parser::header::{HeaderField, HeaderKind};
pub use parser::lines::LineIndex;
pub use parser::part::Part;
