/// Generic validation helpers
use crate::result::TestResult;

/// Fold `(condition, message)` checks into a single [`TestResult`].
///
/// Succeeds with no message when every condition holds. Otherwise the
/// messages of the failing checks are joined with `"; "` in the order given.
pub fn validate_all<I, S>(checks: I) -> TestResult
where
    I: IntoIterator<Item = (bool, S)>,
    S: Into<String>,
{
    let failures: Vec<String> = checks
        .into_iter()
        .filter(|(ok, _)| !ok)
        .map(|(_, message)| message.into())
        .collect();

    if failures.is_empty() {
        TestResult::success()
    } else {
        TestResult::failure(failures.join("; "))
    }
}
