//! Typed asynchronous resource attributes.
//!
//! Creation requests return immediately with handles whose computed
//! attributes (identifiers, addresses, endpoints) resolve once the
//! provisioning engine has materialized the resource. The dependency
//! edges between resources are expressed by composing over these values,
//! never by explicit task control: a consumer suspends on
//! [`Output::resolve`] or derives a new deferred value with
//! [`Output::map`].

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;

use crate::error::{StratoformError, StratoformResult};

type SharedValue<T> = Shared<BoxFuture<'static, Result<T, Arc<str>>>>;

/// A computed attribute of a cloud resource.
///
/// Cloneable and shareable; every clone observes the same resolution.
/// If the provider drops the paired [`Promise`] without fulfilling it,
/// every holder sees a dependency-resolution error.
#[derive(Clone)]
pub struct Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    attribute: Arc<str>,
    inner: SharedValue<T>,
}

impl<T> std::fmt::Debug for Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output")
            .field("attribute", &self.attribute)
            .finish_non_exhaustive()
    }
}

/// Fulfilment side of a pending [`Output`], held by the provisioning
/// engine.
pub struct Promise<T> {
    tx: oneshot::Sender<T>,
}

impl<T> Promise<T> {
    /// Complete the paired output.
    pub fn fulfill(self, value: T) {
        let _ = self.tx.send(value);
    }
}

impl<T> Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// An output that is already resolved.
    pub fn ready(attribute: impl Into<Arc<str>>, value: T) -> Self {
        let inner: BoxFuture<'static, Result<T, Arc<str>>> =
            futures::future::ready(Ok(value)).boxed();
        Self {
            attribute: attribute.into(),
            inner: inner.shared(),
        }
    }

    /// A pending output and the promise that fulfils it.
    pub fn pending(attribute: impl Into<Arc<str>>) -> (Promise<T>, Self) {
        let attribute: Arc<str> = attribute.into();
        let (tx, rx) = oneshot::channel();
        let attr = Arc::clone(&attribute);
        let inner: BoxFuture<'static, Result<T, Arc<str>>> =
            async move { rx.await.map_err(|_| attr) }.boxed();
        (
            Promise { tx },
            Self {
                attribute,
                inner: inner.shared(),
            },
        )
    }

    /// Attribute name, used in diagnostics.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Suspend until the attribute resolves.
    pub async fn resolve(&self) -> StratoformResult<T> {
        self.inner
            .clone()
            .await
            .map_err(|attr| StratoformError::DependencyResolution {
                attribute: attr.to_string(),
            })
    }

    /// The resolved value, without suspending.
    ///
    /// Only valid once some consumer has already observed the output
    /// resolved; anything earlier is an eager dereference and reports a
    /// contract violation.
    pub fn now(&self) -> StratoformResult<T> {
        match self.inner.peek() {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(attr)) => Err(StratoformError::DependencyResolution {
                attribute: attr.to_string(),
            }),
            None => Err(StratoformError::ContractViolation {
                message: format!(
                    "output '{}' dereferenced before resolution",
                    self.attribute
                ),
            }),
        }
    }

    /// Deferred composition: an output that resolves to `f(value)` once
    /// this one resolves.
    pub fn map<U, F>(&self, attribute: impl Into<Arc<str>>, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let upstream = self.inner.clone();
        let inner: BoxFuture<'static, Result<U, Arc<str>>> =
            async move { upstream.await.map(f) }.boxed();
        Output {
            attribute: attribute.into(),
            inner: inner.shared(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StratoformError;

    #[tokio::test]
    async fn ready_output_resolves_immediately() {
        let out = Output::ready("ip", "203.0.113.10".to_string());
        assert_eq!(out.resolve().await.unwrap(), "203.0.113.10");
    }

    #[tokio::test]
    async fn pending_output_resolves_after_fulfilment() {
        let (promise, out) = Output::pending("vm.id");
        promise.fulfill(42u32);
        assert_eq!(out.resolve().await.unwrap(), 42);
        // Clones observe the same resolution.
        assert_eq!(out.clone().resolve().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn dropped_promise_is_a_resolution_failure() {
        let (promise, out) = Output::<String>::pending("subnet.id");
        drop(promise);
        match out.resolve().await {
            Err(StratoformError::DependencyResolution { attribute }) => {
                assert_eq!(attribute, "subnet.id");
            }
            other => panic!("expected resolution failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn eager_dereference_is_a_contract_violation() {
        let (_promise, out) = Output::<String>::pending("nic.id");
        assert!(matches!(
            out.now(),
            Err(StratoformError::ContractViolation { .. })
        ));
    }

    #[tokio::test]
    async fn now_returns_the_value_after_it_was_observed() {
        let (promise, out) = Output::pending("ip");
        promise.fulfill("198.51.100.7".to_string());
        out.resolve().await.unwrap();
        assert_eq!(out.now().unwrap(), "198.51.100.7");
    }

    #[tokio::test]
    async fn map_composes_without_eager_evaluation() {
        let (promise, ip) = Output::pending("ip");
        let endpoint = ip.map("endpoint", |ip: String| format!("https://{ip}:6443"));
        promise.fulfill("203.0.113.20".to_string());
        assert_eq!(
            endpoint.resolve().await.unwrap(),
            "https://203.0.113.20:6443"
        );
    }

    #[tokio::test]
    async fn map_propagates_resolution_failure() {
        let (promise, ip) = Output::<String>::pending("ip");
        let endpoint = ip.map("endpoint", |ip| format!("https://{ip}:6443"));
        drop(promise);
        assert!(matches!(
            endpoint.resolve().await,
            Err(StratoformError::DependencyResolution { .. })
        ));
    }
}
