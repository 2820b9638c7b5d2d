//! Adapters for the domain ports: storage backends, collaborator directories and
//! the payment gateway simulator.

pub mod gateway;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
