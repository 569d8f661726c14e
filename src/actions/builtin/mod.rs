//! Built-in actions shipped with the server.

pub mod batch;
pub mod sleep;

pub use batch::BatchAction;
pub use sleep::SleepAction;
