//! Cooperative cancellation (spec §5, §9: "Replace ad-hoc cancellation via
//! thrown control with an explicit cancellation token passed top-down").

use crate::error::Cancelled;
use tokio_util::sync::CancellationToken;

/// Re-export of the token type every externally-facing operation accepts.
/// A thin wrapper so call sites depend on `agentdock_core::cancel` rather
/// than reaching into `tokio_util` directly.
pub type Cancellation = CancellationToken;

/// Check a token and return [`Cancelled`] if it has fired. Called at every
/// suspension point a long-running operation passes through (spec §5
/// "every `await`-equivalent point checks it").
pub fn check(token: &Cancellation) -> Result<(), Cancelled> {
    if token.is_cancelled() { Err(Cancelled) } else { Ok(()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let token = Cancellation::new();
        assert!(check(&token).is_ok());
    }

    #[test]
    fn cancelled_token_surfaces_error() {
        let token = Cancellation::new();
        token.cancel();
        assert!(check(&token).is_err());
    }
}
