//! HTTP transport implementation

pub mod client;

pub use client::{ReqwestTransport, ReqwestTransportBuilder};
