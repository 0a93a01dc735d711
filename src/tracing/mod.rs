//! Request scope
//!
//! Every user action runs inside a request scope carrying:
//! 1. a request id for log correlation
//! 2. a cancellation token the caller fires when the view is abandoned
//!
//! Gateway calls made inside the scope go through `guard_read` or
//! `guard_write`, which apply the token and the configured timeout.

use std::{fmt, future::Future, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::errors::ServiceError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

impl Default for RequestId {
    fn default() -> Self {
        RequestId(Uuid::new_v4().to_string())
    }
}

impl RequestId {
    pub fn new(value: impl Into<String>) -> Self {
        RequestId(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct RequestScope {
    request_id: RequestId,
    cancel: CancellationToken,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            cancel: CancellationToken::new(),
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// A handle the caller keeps to abandon the request later.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

tokio::task_local! {
    static CURRENT_SCOPE: RequestScope;
}

pub async fn scope_request<Fut, R>(scope: RequestScope, future: Fut) -> R
where
    Fut: Future<Output = R>,
{
    CURRENT_SCOPE.scope(scope, future).await
}

pub fn current_request_id() -> Option<RequestId> {
    CURRENT_SCOPE
        .try_with(|scope| scope.request_id.clone())
        .ok()
}

pub fn current_cancel_token() -> Option<CancellationToken> {
    CURRENT_SCOPE.try_with(|scope| scope.cancel.clone()).ok()
}

/// Fails with `Cancelled` when the current request has been abandoned.
/// Outside a request scope nothing can cancel, so this always passes.
pub fn ensure_not_cancelled(operation: &str) -> Result<(), ServiceError> {
    match current_cancel_token() {
        Some(token) if token.is_cancelled() => {
            warn!(operation, request_id = ?current_request_id(), "request cancelled before write");
            Err(ServiceError::Cancelled(format!(
                "{} abandoned before it started",
                operation
            )))
        }
        _ => Ok(()),
    }
}

/// Runs a read under the request's cancellation token and `timeout`.
/// Cancellation drops the read immediately.
pub async fn guard_read<T, F>(operation: &str, timeout: Duration, future: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    let timed = tokio::time::timeout(timeout, future);
    match current_cancel_token() {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(ServiceError::Cancelled(format!("{} abandoned", operation))),
                result = timed => flatten_timeout(operation, timeout, result),
            }
        }
        None => flatten_timeout(operation, timeout, timed.await),
    }
}

/// Runs one write step under `timeout`. The cancellation token is not
/// consulted here: once a write sequence has passed `ensure_not_cancelled`
/// its steps run to completion or fail on their own.
pub async fn guard_write<T, F>(operation: &str, timeout: Duration, future: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    flatten_timeout(operation, timeout, tokio::time::timeout(timeout, future).await)
}

fn flatten_timeout<T>(
    operation: &str,
    timeout: Duration,
    result: Result<Result<T, ServiceError>, tokio::time::error::Elapsed>,
) -> Result<T, ServiceError> {
    match result {
        Ok(inner) => inner,
        Err(_) => {
            warn!(operation, timeout_ms = timeout.as_millis() as u64, "gateway call timed out");
            Err(ServiceError::persistence(format!(
                "{} timed out after {:?}",
                operation, timeout
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_id_visible_inside_scope_only() {
        let scope = RequestScope::with_request_id(RequestId::new("req-1"));
        let seen = scope_request(scope, async { current_request_id() }).await;
        assert_eq!(seen, Some(RequestId::new("req-1")));
        assert_eq!(current_request_id(), None);
    }

    #[tokio::test]
    async fn cancelled_read_is_dropped() {
        let scope = RequestScope::new();
        scope.cancel();
        let result = scope_request(scope, async {
            guard_read("fetch", Duration::from_secs(5), async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, ServiceError>(1)
            })
            .await
        })
        .await;
        assert!(matches!(result, Err(ServiceError::Cancelled(_))));
    }

    #[tokio::test]
    async fn write_ignores_token_but_not_timeout() {
        let scope = RequestScope::new();
        scope.cancel();
        let result = scope_request(scope.clone(), async {
            guard_write("replace", Duration::from_secs(5), async { Ok::<_, ServiceError>(7) }).await
        })
        .await;
        assert_eq!(result, Ok(7));

        let blocked = scope_request(scope, async { ensure_not_cancelled("save") }).await;
        assert!(matches!(blocked, Err(ServiceError::Cancelled(_))));
    }

    #[tokio::test]
    async fn slow_call_maps_to_persistence_error() {
        let result = guard_read("fetch", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok::<_, ServiceError>(())
        })
        .await;
        assert!(matches!(result, Err(ServiceError::PersistenceError(_))));
    }
}
