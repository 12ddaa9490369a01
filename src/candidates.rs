use std::fmt;

use crate::error::ResolverError;

/// Every candidate that was tried and why it did not match, in order.
#[derive(Debug)]
pub struct Exhausted<C> {
    pub failures: Vec<(C, ResolverError)>,
    pub aborted: bool,
}

impl<C: fmt::Display> fmt::Display for Exhausted<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures.is_empty() {
            return write!(f, "no candidates");
        }
        let parts = self
            .failures
            .iter()
            .map(|(candidate, err)| format!("{candidate}: {err}"))
            .collect::<Vec<_>>();
        write!(f, "{}", parts.join("; "))
    }
}

impl<C> Exhausted<C> {
    /// The error that stopped the search, or the last miss.
    pub fn into_last_error(self) -> Option<ResolverError> {
        self.failures.into_iter().last().map(|(_, err)| err)
    }
}

/// Evaluates candidates in order until one succeeds. A failure for which
/// `keep_going` returns false stops the search early.
pub fn first_match<C, T, F, K>(
    candidates: impl IntoIterator<Item = C>,
    mut attempt: F,
    keep_going: K,
) -> Result<(C, T), Exhausted<C>>
where
    F: FnMut(&C) -> Result<T, ResolverError>,
    K: Fn(&ResolverError) -> bool,
{
    let mut failures = Vec::new();
    for candidate in candidates {
        match attempt(&candidate) {
            Ok(value) => return Ok((candidate, value)),
            Err(err) => {
                let stop = !keep_going(&err);
                failures.push((candidate, err));
                if stop {
                    return Err(Exhausted {
                        failures,
                        aborted: true,
                    });
                }
            }
        }
    }
    Err(Exhausted {
        failures,
        aborted: false,
    })
}
