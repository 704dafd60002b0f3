//! Observable application state.
//!
//! - [`StateVariable`] holds one typed value and fans out change
//!   notifications through a [`Signal`].
//! - [`StateSet`] is the ordered collection a [`StateHandler`] owns.
//! - [`StateEngine`] indexes every live state by `handler::name` for the
//!   text-driven `Set` action and for bulk export.

mod engine;
mod handler;
mod signal;
mod variable;

pub use engine::StateEngine;
pub use handler::{StateHandler, StateSet};
pub use signal::{Signal, Subscription};
pub use variable::{StateBase, StateHandle, StateValue, StateVariable};
