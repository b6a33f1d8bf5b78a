//! Bearer token authentication and permission checks.
//!
//! Tokens are RS256 JWTs issued by an external identity provider; the keys
//! they are signed with come from the provider's JSON Web Key Set. Each
//! protected handler names the permission it needs and calls
//! [`Authorizer::authorize`] before touching the request body.

mod claims;
mod errors;
mod guard;
mod verifier;

pub use self::claims::{Audience, Claims, Permissions};
pub use self::errors::AuthError;
pub use self::guard::{bearer_token, AuthContext, Authorizer};
pub use self::verifier::{KeySet, RemoteKeys, TokenVerifier, ALLOWED_ALGORITHMS};
