//! Ordered backend fallback.
//!
//! DESIGN
//! ======
//! A `FallbackChain` is a list of `(Backend, future)` attempts evaluated in
//! order. The first `Ok` short-circuits; each `Err` except the last is
//! logged and dropped. The last attempt's result is returned unchanged, so a
//! secondary failure reaches the caller exactly as the provider reported it.
//!
//! Futures are lazy: an attempt that is never reached never touches the
//! network.

use futures::future::BoxFuture;

use crate::types::{AuthError, Backend};

/// A single step in a fallback chain.
pub struct Attempt<'a, T> {
    backend: Backend,
    run: BoxFuture<'a, Result<T, AuthError>>,
}

/// Declarative primary-then-secondary policy for one operation. A chain
/// always holds at least one attempt.
pub struct FallbackChain<'a, T> {
    operation: &'static str,
    first: Attempt<'a, T>,
    rest: Vec<Attempt<'a, T>>,
}

impl<'a, T> FallbackChain<'a, T> {
    /// Start a chain with the attempt that runs first.
    #[must_use]
    pub fn new(operation: &'static str, backend: Backend, run: BoxFuture<'a, Result<T, AuthError>>) -> Self {
        Self { operation, first: Attempt { backend, run }, rest: Vec::new() }
    }

    /// Append an attempt. Attempts run in the order they were added.
    #[must_use]
    pub fn then(mut self, backend: Backend, run: BoxFuture<'a, Result<T, AuthError>>) -> Self {
        self.rest.push(Attempt { backend, run });
        self
    }

    /// Backends in evaluation order.
    #[must_use]
    pub fn order(&self) -> Vec<Backend> {
        std::iter::once(&self.first)
            .chain(&self.rest)
            .map(|a| a.backend)
            .collect()
    }

    /// Run attempts until one succeeds.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error when every attempt fails.
    pub async fn run(self) -> Result<(Backend, T), AuthError> {
        let mut backend = self.first.backend;
        let mut result = self.first.run.await;

        for next in self.rest {
            let Err(e) = &result else { break };
            tracing::warn!(
                operation = self.operation,
                backend = ?backend,
                error = %e,
                "auth attempt failed; falling back"
            );
            backend = next.backend;
            result = next.run.await;
        }

        result.map(|value| (backend, value))
    }
}

#[cfg(test)]
#[path = "fallback_test.rs"]
mod tests;
