//! Pipeline analysis.
//!
//! Pure functions over the loaded deal and action collections. Nothing in
//! here performs I/O or holds state between calls.

pub mod actions;
pub mod aggregator;
pub mod aging;
pub mod risk;
pub mod transition;

pub use actions::*;
pub use aggregator::*;
pub use aging::*;
pub use risk::*;
pub use transition::*;
