/// Courier auth primitives.
///
/// Two leaf components with no storage or transport dependencies:
/// - `password`: salted Argon2id hashing with a tunable work factor.
/// - `token`: stateless HS256 identity tokens bound to a username.
///
/// Both are constructed once at startup from config and injected into the
/// services that need them.

pub mod password;
pub mod token;

pub use password::PasswordHasher;
pub use token::TokenIssuer;
