//! Access-token management
//!
//! The cache owns the only copy of the current token. Everything that needs
//! a token asks the cache for it; nothing else stores one.

pub mod ports;
pub mod token_cache;

pub use ports::CredentialSource;
pub use token_cache::AuthTokenCache;
