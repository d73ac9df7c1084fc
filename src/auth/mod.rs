//! Authentication: password hashing and session tokens

pub mod jwt;
pub mod password;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenValidationResult};
pub use password::{hash_password, normalize_email, validate_password, verify_password};
