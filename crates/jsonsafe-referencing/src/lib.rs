//! # jsonsafe-referencing
//!
//! Reference resolution for the `jsonsafe` schema compiler.
//!
//! The compiler hands [`resolve`] the document it is compiling, the additional documents the
//! caller registered, a reference and the base path of the resource the reference appears in.
//! Resolution joins the reference onto the base with [`join_path`], then looks for `$id` and
//! `$anchor` matches, JSON Pointer fragments and whole additional documents.
mod dialect;
mod error;
mod path;
mod pointer;
mod resolver;

pub use dialect::Draft;
pub use error::Error;
pub use path::{join_path, split_fragment};
pub use pointer::{escape_segment, parse_index, pointer, unescape_segment};
pub use resolver::{pointer_to, resolve, Resolved};
