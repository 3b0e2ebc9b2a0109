//! Bounded retry with explicit error classification

use crate::error::{Result, TrakError};
use log::debug;

/// How an error affects the operation that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth another attempt, e.g. a burst that has not fully arrived yet
    Transient,
    /// Give up right away
    Fatal,
}

impl ErrorClass {
    pub fn of(error: &TrakError) -> Self {
        if error.is_transient() {
            ErrorClass::Transient
        } else {
            ErrorClass::Fatal
        }
    }
}

/// Attempt budget for one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryPolicy {
    /// A budget of zero is treated as one attempt
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until it succeeds, fails fatally or the budget runs out
    ///
    /// `op` receives the 1-based attempt number. Fatal errors are returned
    /// unchanged. Running out of attempts on a transient error yields
    /// [`TrakError::Burst`] carrying the last error message.
    pub fn run<T, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let mut attempt = 1;
        loop {
            let err = match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            match ErrorClass::of(&err) {
                ErrorClass::Fatal => return Err(err),
                ErrorClass::Transient if attempt >= self.max_attempts => {
                    return Err(TrakError::Burst {
                        attempts: attempt,
                        message: err.to_string(),
                    });
                }
                ErrorClass::Transient => {
                    debug!("attempt {}/{} failed: {}", attempt, self.max_attempts, err);
                    attempt += 1;
                }
            }
        }
    }
}
