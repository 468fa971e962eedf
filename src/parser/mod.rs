//! MIME decoding: transport normalization, line indexing, header parsing,
//! recursive part trees, and loading messages from disk.

pub mod date;
pub mod eml;
pub mod header;
pub mod lines;
pub mod normalize;
pub mod part;
