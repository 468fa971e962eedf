//! Decoded message types: the message query surface, attachment metadata,
//! and serializable tree summaries.

pub mod attachment;
pub mod message;
pub mod tree;
