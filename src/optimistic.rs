use std::fmt::Display;
use std::future::Future;

use tracing::warn;

/// Applies `change` to `state` right away, then waits for `remote`.
///
/// If the remote call fails the state is restored to what it was before the
/// change and the error is returned. Nothing is retried.
pub async fn apply_optimistically<S, T, E, F>(
    state: &mut S,
    change: impl FnOnce(&mut S),
    remote: F,
) -> Result<T, E>
where
    S: Clone,
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    let previous = state.clone();
    change(state);

    match remote.await {
        Ok(value) => Ok(value),
        Err(err) => {
            warn!(error = %err, "remote update failed, rolling back local change");
            *state = previous;
            Err(err)
        }
    }
}
