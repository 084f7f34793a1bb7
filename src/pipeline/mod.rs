//! Post-processing: identity grouping, metadata injection, and per-item
//! folder reorganization.

mod group;
mod identity;
mod metadata;
mod organize;

pub use group::*;
pub use identity::*;
pub use metadata::*;
pub use organize::*;
