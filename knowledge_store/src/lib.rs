//! # Knowledge Store
//!
//! Semantic tag sets, taxonomies and semantic nets that behave the same
//! whether their state lives in process memory or in a relational database.
//!
//! ## Core Components
//!
//! - **knowledge_base**: Capability traits for tags, sets, information and
//!   context points, plus the tag algebra written against those traits
//! - **context_assembler**: Fragmentation and contextualization, deriving
//!   read-only sub-collections around anchor tags
//! - **inmemory**: Backend holding everything in an in-process arena
//! - **sql**: Backend over SQLite where every object is a thin row handle
//!
//! ## Design Philosophy
//!
//! - **One algebra**: identity, merge and traversal only go through the traits,
//!   so both backends share a single implementation of the rules
//! - **Immediate persistence**: every mutation is written through at once
//! - **Identity by subject identifiers**: tags from different stores are the
//!   same concept when they share an SI, never by row id or pointer

pub mod context_assembler;
pub mod inmemory;
pub mod knowledge_base;
pub mod sql;

pub use context_assembler::*;
pub use inmemory::*;
pub use knowledge_base::*;
pub use sql::*;

pub use semantic_model::*;
