//! Domain models for the interaction checker.

mod check;
mod context;
mod interaction;
mod selection;
mod severity;
mod substance;

pub use check::*;
pub use context::*;
pub use interaction::*;
pub use selection::*;
pub use severity::*;
pub use substance::*;
