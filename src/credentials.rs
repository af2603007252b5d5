//! Caller credential propagation.
//!
//! The inbound `Authorization` header is scoped over the handling of one
//! request with a tokio task-local. The product client reads it back and
//! forwards it unchanged. The order service itself never sees the credential.
//! Concurrent fan-out inside the service is polled on the same task, so every
//! outbound call of the request sees the same value.

use std::future::Future;

tokio::task_local! {
    static CALLER_CREDENTIAL: Option<String>;
}

pub async fn scope<F: Future>(credential: Option<String>, fut: F) -> F::Output {
    CALLER_CREDENTIAL.scope(credential, fut).await
}

/// The credential of the request being handled, if any.
pub fn current() -> Option<String> {
    CALLER_CREDENTIAL.try_with(Clone::clone).ok().flatten()
}
