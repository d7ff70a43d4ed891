//! Runs nesting jobs off the calling thread.
//!
//! A [`Coordinator`] owns one backend: the shelf heuristic, or a background worker thread driving an
//! [`Optimizer`](sheetnest::optimizer::Optimizer) over typed message channels ([`protocol`]).
//! Whichever backend ran, its output is validated and normalized into a
//! [`NestingResult`](sheetnest::entities::NestingResult).

/// Messages exchanged with the background worker and their JSON form
pub mod protocol;

/// The background optimizer thread
pub mod worker;

/// Maps backend output to a validated result
pub mod normalize;

pub mod coordinator;

/// Request-scoped record of a single run
pub mod session;

pub mod io;

pub mod cli;

#[doc(inline)]
pub use coordinator::{Coordinator, JobState};
#[doc(inline)]
pub use session::NestingSession;
