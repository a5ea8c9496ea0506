//! I/O utilities for steward-rs.
//!
//! Provides report file output along with Unicode-safe truncation helpers.

pub mod unicode;
pub mod writer;

pub use unicode::{clip_bytes, ellipsize, find_char_boundary, single_line, truncate_graphemes};
pub use writer::write_file;
