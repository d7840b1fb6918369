//! High-level client over the orchestration stack

pub mod client;

pub use client::FabricClient;
