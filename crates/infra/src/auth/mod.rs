//! Credential sources backing the token cache

pub mod credentials;

pub use credentials::{credential_source, ClientCredentialsSource, StaticTokenSource};
