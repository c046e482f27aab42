//! Saga store implementations.

pub mod memory;

pub use memory::InMemorySagaStore;
