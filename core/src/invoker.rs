//! One operation call with optional headers and retries.

use std::collections::BTreeMap;
use std::fmt;
use std::thread;

use tracing::info;

use crate::client::HcHttpClient;
use crate::def::HttpRequestDef;
use crate::error::Result;
use crate::extract::SdkRequest;
use crate::response::SdkResponse;
use crate::retry::BackoffStrategy;

type RetryChecker<T> = Box<dyn Fn(&Result<T>) -> bool + Send + Sync>;

struct RetryPolicy<T> {
    times: u32,
    checker: RetryChecker<T>,
    strategy: Box<dyn BackoffStrategy>,
}

/// Invokes `def` with `request` on `client`.
///
/// Each attempt rebuilds the request from scratch, so credentials and
/// endpoint failover apply per attempt. The result of the last attempt is
/// returned unchanged, whether the checker accepted it or retries ran out.
pub struct BaseInvoker<'a, R: ?Sized, T> {
    client: HcHttpClient,
    request: &'a R,
    def: &'a HttpRequestDef,
    headers: BTreeMap<String, String>,
    retry: Option<RetryPolicy<T>>,
}

impl<'a, R, T> BaseInvoker<'a, R, T>
where
    R: SdkRequest + ?Sized,
    T: SdkResponse,
{
    pub fn new(client: &HcHttpClient, request: &'a R, def: &'a HttpRequestDef) -> Self {
        Self {
            client: client.clone(),
            request,
            def,
            headers: BTreeMap::new(),
            retry: None,
        }
    }

    /// Extra header for this call only.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Allow up to `times` attempts. After each attempt `checker` returns
    /// `true` when another attempt should follow.
    pub fn with_retry<F, S>(mut self, times: u32, checker: F, strategy: S) -> Self
    where
        F: Fn(&Result<T>) -> bool + Send + Sync + 'static,
        S: BackoffStrategy + 'static,
    {
        self.retry = Some(RetryPolicy {
            times,
            checker: Box::new(checker),
            strategy: Box::new(strategy),
        });
        self
    }

    pub fn invoke(self) -> Result<T> {
        let client = self.client.pre_invoke(self.headers);
        let Some(retry) = self.retry else {
            return client.sync_invoke(self.request, self.def);
        };

        let mut attempt = 1;
        loop {
            let result = client.sync_invoke(self.request, self.def);
            if attempt >= retry.times || !(retry.checker)(&result) {
                return result;
            }
            let delay = retry.strategy.compute_delay_before_next_retry();
            info!(
                attempt,
                times = retry.times,
                delay_ms = delay.as_millis() as u64,
                path = self.def.path(),
                "retrying request"
            );
            thread::sleep(delay);
            attempt += 1;
        }
    }
}

impl<R: ?Sized, T> fmt::Debug for BaseInvoker<'_, R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseInvoker")
            .field("path", &self.def.path())
            .field("headers", &self.headers)
            .field("retry_times", &self.retry.as_ref().map(|retry| retry.times))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenCredentials;
    use crate::error::SdkError;
    use crate::retry::NoBackoff;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// A client whose credentials always fail, counting each attempt.
    fn failing_client(attempts: Arc<AtomicUsize>) -> HcHttpClient {
        HcHttpClient::builder()
            .with_endpoints(["http://127.0.0.1:1"])
            .with_credentials(TokenCredentials::from_provider(move || {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(SdkError::Credentials("token expired".into()))
            }))
            .build()
            .unwrap()
    }

    #[test]
    fn without_retry_calls_once() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let client = failing_client(Arc::clone(&attempts));
        let def = HttpRequestDef::builder().build();
        let request = json!({});
        let result = BaseInvoker::<_, Value>::new(&client, &request, &def).invoke();
        assert!(matches!(result, Err(SdkError::Credentials(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retries_until_times_is_reached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let client = failing_client(Arc::clone(&attempts));
        let def = HttpRequestDef::builder().build();
        let request = json!({});
        let result = BaseInvoker::<_, Value>::new(&client, &request, &def)
            .with_retry(3, |result| result.is_err(), NoBackoff)
            .invoke();
        assert!(matches!(result, Err(SdkError::Credentials(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn checker_can_stop_early() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let client = failing_client(Arc::clone(&attempts));
        let def = HttpRequestDef::builder().build();
        let request = json!({});
        let result = BaseInvoker::<_, Value>::new(&client, &request, &def)
            .with_retry(5, |_| false, NoBackoff)
            .invoke();
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_times_still_attempts_once() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let client = failing_client(Arc::clone(&attempts));
        let def = HttpRequestDef::builder().build();
        let request = json!({});
        let _ = BaseInvoker::<_, Value>::new(&client, &request, &def)
            .with_retry(0, |_| true, NoBackoff)
            .invoke();
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
