// Tri-state result discipline
// Resolvers distinguish "didn't find one, try something else" from
// "compile error, abort the module". Diagnostics are reported at the
// point of raising; `Fatal` only propagates the abort upward.

/// The two failure arms of a tri-state result
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Failure {
    /// Recoverable: the caller may try alternatives
    #[error("not found")]
    NotFound,
    /// A compile error was reported; abort the current module
    #[error("compilation failed")]
    Fatal,
}

pub type GenResult<T> = Result<T, Failure>;

/// Shorthand for raising the recoverable arm
pub fn not_found<T>() -> GenResult<T> {
    Err(Failure::NotFound)
}

/// Shorthand for raising the fatal arm (after reporting a diagnostic)
pub fn fatal<T>() -> GenResult<T> {
    Err(Failure::Fatal)
}

/// Convert a recoverable miss into `None`, letting fatal errors through
pub fn maybe<T>(result: GenResult<T>) -> GenResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(Failure::NotFound) => Ok(None),
        Err(Failure::Fatal) => Err(Failure::Fatal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maybe_separates_arms() {
        assert_eq!(maybe(Ok(1)), Ok(Some(1)));
        assert_eq!(maybe::<i32>(Err(Failure::NotFound)), Ok(None));
        assert_eq!(maybe::<i32>(Err(Failure::Fatal)), Err(Failure::Fatal));
    }
}
