//! Action abstraction — definitions, handler contract, registry.

pub mod builtin;
pub mod definition;
pub mod registry;

pub use definition::{ActionDefinition, ActionHandler, TaskContext};
pub use registry::ActionRegistry;
