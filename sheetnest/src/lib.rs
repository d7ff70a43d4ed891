//! Core of the sheet nesting engine: the data model, axis-aligned collision geometry,
//! the deterministic shelf-pack heuristic and the contract advanced optimizers implement.
//!
//! Nothing in this crate holds state between calls, every entity is created per nesting run.

/// Parts, sheets, placements and results
pub mod entities;

/// Axis-aligned bounding boxes and the collision/utilization functions built on them
pub mod geometry;

/// First-Fit-Decreasing-Height shelf packing over multiple sheets
pub mod shelf;

/// Request configuration, merged once with the defaults
pub mod config;

/// Interface every advanced (non-heuristic) nesting backend implements
pub mod optimizer;

/// External (serializable) representations and SVG export
pub mod io;

/// Helper functions which do not belong to any specific module
pub mod util;

#[doc(inline)]
pub use shelf::shelf_pack;
