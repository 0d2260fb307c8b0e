pub mod access_token;
pub mod error;
pub mod store;

// Re-export public types and functions
pub use access_token::AccessToken;
pub use error::TokenError;
pub use store::{IssuedToken, TokenStore};
