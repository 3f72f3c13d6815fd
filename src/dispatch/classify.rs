//! Transient-failure classification.
//!
//! # Responsibilities
//! - Decide, once per failure, whether an unclassified fault is worth retrying
//! - Stay backend-agnostic: the dispatch loop only sees a yes/no answer
//!
//! # Design Decisions
//! - Classification is a plain function of the error; it cannot fail or recurse
//! - The error's `source()` chain is walked so wrapped driver errors still match

use std::error::Error as StdError;
use std::fmt;

/// SQLSTATE `serialization_failure`.
pub const SERIALIZATION_FAILURE: &str = "40001";

/// SQLSTATE `lock_not_available`.
pub const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Decides whether a handler failure is a transient backend condition.
pub trait Classify: Send + Sync + 'static {
    fn is_transient(&self, cause: &(dyn StdError + 'static)) -> bool;
}

impl<F> Classify for F
where
    F: Fn(&(dyn StdError + 'static)) -> bool + Send + Sync + 'static,
{
    fn is_transient(&self, cause: &(dyn StdError + 'static)) -> bool {
        self(cause)
    }
}

/// Classifies database errors by SQLSTATE code.
///
/// Generic over the driver's error type `E`; `extract` reads the SQLSTATE from
/// it. The first error of type `E` in the source chain decides.
///
/// ```ignore
/// let classifier = SqlStateClassifier::new(|e: &tokio_postgres::Error| {
///     e.code().map(|c| c.code())
/// });
/// ```
pub struct SqlStateClassifier<E> {
    extract: fn(&E) -> Option<&str>,
    codes: Vec<String>,
}

impl<E> SqlStateClassifier<E>
where
    E: StdError + 'static,
{
    /// Classifier retrying serialization failures and lock timeouts.
    pub fn new(extract: fn(&E) -> Option<&str>) -> Self {
        Self {
            extract,
            codes: vec![SERIALIZATION_FAILURE.to_string(), LOCK_NOT_AVAILABLE.to_string()],
        }
    }

    /// Replace the set of retryable codes.
    pub fn with_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.codes = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }
}

impl<E> Classify for SqlStateClassifier<E>
where
    E: StdError + 'static,
{
    fn is_transient(&self, cause: &(dyn StdError + 'static)) -> bool {
        let mut current = Some(cause);
        while let Some(err) = current {
            if let Some(db_err) = err.downcast_ref::<E>() {
                return (self.extract)(db_err)
                    .is_some_and(|code| self.codes.iter().any(|c| c == code));
            }
            current = err.source();
        }
        false
    }
}

impl<E> fmt::Debug for SqlStateClassifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlStateClassifier")
            .field("codes", &self.codes)
            .finish()
    }
}
