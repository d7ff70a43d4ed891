//! Genetic optimizer for sheet nesting.
//!
//! Individuals encode the order in which units are placed and the rotation of every unit.
//! A bottom-left skyline decoder turns an individual into a multi-sheet layout of
//! bounding boxes, kept `spacing` apart.

pub mod chromosome;
pub mod config;
pub mod decoder;
mod ga_optimizer;

#[doc(inline)]
pub use config::GAConfig;
#[doc(inline)]
pub use ga_optimizer::GAOptimizer;
