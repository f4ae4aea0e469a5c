//! Common data structures for Ratus.
//!
//! This crate provides the position types every stage of the pipeline shares:
//! - `Span`: a byte range into the source file
//! - `LineIndex`: conversion from byte offsets to 1-based line/column pairs

mod location;
mod span;

pub use location::{LineIndex, Location};
pub use span::{BytePos, Span};
