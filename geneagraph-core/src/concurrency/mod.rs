//! Concurrency primitives for the traversal engine.

pub mod event;
pub mod scope;

pub use event::Event;
pub use scope::TaskScope;
