//! Random resource names for templates that do not pin one

use rand::RngCore;
use thiserror::Error;

/// Longest object name the API server accepts
pub const MAX_NAME_LENGTH: usize = 63;

/// Upper bound on the hex digest appended to the prefix
pub const MAX_DIGEST_LENGTH: usize = 32;

pub const DEFAULT_PREFIX: &str = "k6";

#[derive(Debug, Error)]
pub enum NameError {
    #[error("name prefix {0:?} leaves no room for a random suffix")]
    PrefixTooLong(String),

    #[error("random source unavailable: {0}")]
    RandomSource(#[from] rand::Error),
}

/// Generate `prefix-<hex>` from bytes drawn from `rng`
///
/// The digest takes whatever room is left under [`MAX_NAME_LENGTH`], capped
/// at [`MAX_DIGEST_LENGTH`] characters.
pub fn generate_name<R: RngCore + ?Sized>(prefix: &str, rng: &mut R) -> Result<String, NameError> {
    let budget = MAX_NAME_LENGTH
        .saturating_sub(prefix.len() + 1)
        .min(MAX_DIGEST_LENGTH);
    if budget == 0 {
        return Err(NameError::PrefixTooLong(prefix.to_string()));
    }

    let mut bytes = vec![0u8; budget.div_ceil(2)];
    rng.try_fill_bytes(&mut bytes)?;

    let mut digest = hex::encode(bytes);
    digest.truncate(budget);

    Ok(format!("{}-{}", prefix, digest))
}
