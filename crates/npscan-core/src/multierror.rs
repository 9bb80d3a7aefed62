//! Error aggregation for batch operations.
//!
//! Polling and notification dispatch keep going after individual failures
//! and report everything at the end. [`collapse`] turns the collected list
//! into a single result:
//!
//! - no errors: `Ok(())`
//! - one error: that error, unchanged
//! - several errors: the error type's aggregate form

use std::fmt;

/// A list of errors collected from independent operations.
#[derive(Debug)]
pub struct MultiError<E> {
    errors: Vec<E>,
}

impl<E> MultiError<E> {
    pub fn errors(&self) -> &[E] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<E> {
        self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl<E: fmt::Display> fmt::Display for MultiError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for MultiError<E> {}

/// Error types that can wrap several instances of themselves.
pub trait Aggregate: Sized {
    fn aggregate(errors: MultiError<Self>) -> Self;
}

/// Collapse a list of errors into a single result.
pub fn collapse<E: Aggregate>(mut errors: Vec<E>) -> Result<(), E> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(E::aggregate(MultiError { errors })),
    }
}
