use argon2::PasswordHasher as _;
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordVerifier,
    password_hash::{self, SaltString, rand_core::OsRng},
};
use thiserror::Error;

/// Argon2 iteration count used when no work factor is configured.
pub const DEFAULT_WORK_FACTOR: u32 = Params::DEFAULT_T_COST;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("invalid hash parameters: {0}")]
    Params(argon2::Error),
    #[error("password hashing failed: {0}")]
    Hash(password_hash::Error),
}

impl From<password_hash::Error> for HashError {
    fn from(err: password_hash::Error) -> Self {
        Self::Hash(err)
    }
}

/// One-way salted password hashing with Argon2id.
///
/// The work factor is the iteration count (`t_cost`); memory and lane count
/// stay at the crate defaults. Raising it over time keeps hashing expensive
/// enough to resist offline brute force.
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    pub fn new(work_factor: u32) -> Result<Self, HashError> {
        let params = Params::new(Params::DEFAULT_M_COST, work_factor, Params::DEFAULT_P_COST, None)
            .map_err(HashError::Params)?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, argon2::Version::V0x13, params),
        })
    }

    /// Hash a plaintext password with a fresh random salt. Returns the
    /// PHC-format hash string. Failure means a library fault, not bad input.
    pub fn hash(&self, password: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self.argon2.hash_password(password.as_bytes(), &salt)?;
        Ok(hash.to_string())
    }

    /// Verify a plaintext password against a stored hash. A mismatch is
    /// `Ok(false)`, never an error; only a corrupt stored hash or a library
    /// fault errors.
    pub fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(stored_hash)?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
