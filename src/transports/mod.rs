//! Concrete [`Transport`](crate::Transport) implementations.

pub mod rest;
pub mod shared_memory;

pub use rest::RestTransport;
pub use shared_memory::{LinkState, SharedMemoryTransport};
