//! Credentials: password hashing, signed access tokens and request extractors.

mod extract;
mod password;
mod token;

pub use extract::{ADMIN_TOKEN_HEADER, AuthUser, require_admin_token};
pub use password::{hash_password, verify_password};
pub use token::{Claims, IssuedToken, TokenCodec, TokenError, token_digest};
