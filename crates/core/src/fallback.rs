//! Ordered "try each candidate until one succeeds" execution.

use std::future::Future;

/// One failed attempt, kept for reporting once the chain is exhausted.
#[derive(Debug)]
pub struct Attempt<C, E> {
    pub candidate: C,
    pub error: E,
}

#[derive(Debug)]
pub struct Exhausted<C, E> {
    pub attempts: Vec<Attempt<C, E>>,
    /// True when a fatal error cut the chain short.
    pub aborted: bool,
}

/// Runs `op` against each candidate in order and returns the first success with its candidate.
///
/// Attempts are sequential and share nothing. A failure for which `is_fatal`
/// returns true stops the chain without trying the remaining candidates.
pub async fn first_success<C, T, E, F, Fut>(
    candidates: impl IntoIterator<Item = C>,
    mut op: F,
    is_fatal: impl Fn(&E) -> bool,
) -> Result<(C, T), Exhausted<C, E>>
where
    C: Clone,
    F: FnMut(C) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempts = Vec::new();
    for candidate in candidates {
        match op(candidate.clone()).await {
            Ok(value) => return Ok((candidate, value)),
            Err(error) => {
                let fatal = is_fatal(&error);
                attempts.push(Attempt { candidate, error });
                if fatal {
                    return Err(Exhausted {
                        attempts,
                        aborted: true,
                    });
                }
            }
        }
    }
    Err(Exhausted {
        attempts,
        aborted: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[tokio::test]
    async fn stops_at_first_success() {
        let tried = RefCell::new(Vec::new());
        let result = first_success(
            ["a", "b", "c"],
            |c| {
                tried.borrow_mut().push(c);
                async move {
                    if c == "b" {
                        Ok(c.len())
                    } else {
                        Err(format!("{c} down"))
                    }
                }
            },
            |_| false,
        )
        .await;
        assert_eq!(result.unwrap(), ("b", 1));
        assert_eq!(*tried.borrow(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn exhaustion_reports_every_attempt() {
        let result: Result<(&str, ()), _> =
            first_success(["a", "b"], |c| async move { Err(c) }, |_| false).await;
        let exhausted = result.unwrap_err();
        assert!(!exhausted.aborted);
        let order: Vec<_> = exhausted.attempts.iter().map(|a| a.candidate).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn fatal_error_aborts_chain() {
        let result: Result<(&str, ()), _> = first_success(
            ["a", "b", "c"],
            |c| async move { Err(c == "a") },
            |fatal: &bool| *fatal,
        )
        .await;
        let exhausted = result.unwrap_err();
        assert!(exhausted.aborted);
        assert_eq!(exhausted.attempts.len(), 1);
    }

    #[tokio::test]
    async fn empty_chain_is_exhausted() {
        let result: Result<(&str, ()), Exhausted<&str, ()>> =
            first_success(Vec::<&str>::new(), |_| async { Ok(()) }, |_| false).await;
        assert!(result.unwrap_err().attempts.is_empty());
    }
}
