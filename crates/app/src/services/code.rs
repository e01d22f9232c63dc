//! Unique form code generation.
//!
//! Codes are drawn uniformly from the 5-digit space and checked against
//! existing forms. After [`ATTEMPTS_PER_RANGE`] collisions the generator
//! widens to 6 digits, and after as many again it gives up.

use std::future::Future;
use std::ops::RangeInclusive;

use rand::Rng;
use thiserror::Error;

use shopiform_core::{FormCode, FormCodeError};

use crate::db::RepositoryError;

/// 5-digit codes, tried first.
pub const PRIMARY_RANGE: RangeInclusive<u32> = 10_000..=99_999;
/// 6-digit codes, tried once the 5-digit space keeps colliding.
pub const WIDENED_RANGE: RangeInclusive<u32> = 100_000..=999_999;
/// Candidates drawn from each range before moving on.
pub const ATTEMPTS_PER_RANGE: usize = 32;

/// Errors from [`generate_unique_code`].
#[derive(Debug, Error)]
pub enum CodeGenerationError {
    /// Every candidate was already taken.
    #[error("no free form code after {attempts} attempts")]
    Exhausted { attempts: usize },

    /// A candidate did not form a valid code.
    #[error("generated an invalid form code: {0}")]
    Invalid(#[from] FormCodeError),

    /// The existence check failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Draw a code that `exists` reports as unused.
///
/// # Errors
///
/// Returns [`CodeGenerationError::Exhausted`] when both ranges are used up,
/// or the first error returned by `exists`.
pub async fn generate_unique_code<R, F, Fut>(
    rng: &mut R,
    mut exists: F,
) -> Result<FormCode, CodeGenerationError>
where
    R: Rng,
    F: FnMut(FormCode) -> Fut,
    Fut: Future<Output = Result<bool, RepositoryError>>,
{
    let mut attempts = 0;
    for range in [PRIMARY_RANGE, WIDENED_RANGE] {
        for _ in 0..ATTEMPTS_PER_RANGE {
            attempts += 1;
            let candidate = FormCode::from_number(rng.random_range(range.clone()))?;
            if !exists(candidate.clone()).await? {
                return Ok(candidate);
            }
            tracing::debug!(code = %candidate, attempts, "form code collision");
        }
        tracing::warn!(attempts, "form code range crowded, widening");
    }
    Err(CodeGenerationError::Exhausted { attempts })
}
