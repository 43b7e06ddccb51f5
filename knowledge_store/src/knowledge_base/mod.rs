//! Knowledge Base module - the capability traits every backend implements.
//!
//! A knowledge base is organised as:
//! - **Tags**: Concepts identified by subject identifiers, with peer, spatial
//!   and time specializations
//! - **Sets**: Tag sets viewed flat, as a taxonomy, or as a semantic net
//! - **Information**: Content blobs attached to context points
//!
//! The tag algebra in [`algebra`] only talks to these traits, so the rules for
//! identity and merging are written once for both backends.

pub mod algebra;
mod information;
mod sets;
mod tag;

pub use algebra::{identical, merge_tags};
pub use information::*;
pub use sets::*;
pub use tag::*;
