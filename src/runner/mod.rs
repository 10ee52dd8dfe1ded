//! Job step runner.
//!
//! - [`StepsRunner`] - runs steps in order: condition, body, async
//!   command drain, result merge
//! - [`CancellationHook`] - callback for job cancellation while a step is
//!   active

pub mod cancellation;
pub mod steps_runner;

pub use cancellation::CancellationHook;
pub use steps_runner::{StepsRunner, STEP_TIMED_OUT};
