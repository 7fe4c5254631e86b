//! Authentication: bearer JWTs, Argon2id password hashes and the request
//! principal.
//!
//! Access tokens carry the user's tenant and role as explicit claims, so
//! authorization never has to infer privileges from which endpoints happen
//! to succeed.

pub mod claims;
pub mod extractors;
pub mod jwt;
pub mod password;
pub mod principal;
pub mod token;

pub use claims::{AccessClaims, RefreshClaims, StandardClaims, TokenType};
pub use extractors::{CurrentUser, OptionalUser};
pub use jwt::{JwtIssuer, JwtIssuerConfig, TokenPair, TokenSubject};
pub use password::{PasswordConfig, PasswordHasher};
pub use principal::{Principal, Role};
pub use token::TokenExtractor;
