//! # Semantic Model
//!
//! The value layer of the knowledge store: everything about semantic tags that
//! can be expressed without a storage backend. Both the in-memory and the
//! relational backends build on these types, so identity and merge rules are
//! written once and shared.
//!
//! ## Core Components
//!
//! - **identity**: Subject identifiers, arena ids and the id issuer
//! - **tag**: Tag types, specializations and detached snapshots with the value-level algebra
//! - **properties**: Property bags, reserved system keys and name validation
//! - **context**: Context coordinates addressing a context point
//! - **content**: Information payload helpers (fingerprint, timestamps)

pub mod content;
pub mod context;
pub mod error;
pub mod identity;
pub mod properties;
pub mod tag;

pub use content::*;
pub use context::*;
pub use error::*;
pub use identity::*;
pub use properties::*;
pub use tag::*;
