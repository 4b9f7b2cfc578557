use std::future::Future;

use async_trait::async_trait;

use crate::error::BoxError;

/// A unit of asynchronous work accepted by a [Funnel](crate::Funnel).
///
/// Implemented for any `FnOnce() -> Future<Output = Result<(), BoxError>>`
/// closure, so most callers never implement this directly:
///
/// ```
/// use funnel_limiter::{BoxError, Config, Funnel};
///
/// # let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
/// # rt.block_on(async {
/// let funnel = Funnel::new(4, Config::default());
/// funnel.push(|| async { Ok::<(), BoxError>(()) });
/// # });
/// ```
///
/// Arguments travel inside the closure's captures; the completion signal is a
/// first-class parameter of [push_with](crate::Funnel::push_with) rather than
/// part of the call itself.
#[async_trait]
pub trait AsyncCall: Send + 'static {
    /// Run the call to completion.
    async fn call(self: Box<Self>) -> Result<(), BoxError>;

    /// Identity of the call, used in timeout diagnostics.
    ///
    /// Defaults to the type name, which for closures includes the definition
    /// site. Wrap with [named] for a friendlier label.
    fn label(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

#[async_trait]
impl<F, Fut> AsyncCall for F
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn call(self: Box<Self>) -> Result<(), BoxError> {
        (*self)().await
    }
}

/// Attach a human-readable label to a call, for timeout diagnostics.
pub fn named<C: AsyncCall>(label: impl Into<String>, call: C) -> Named<C> {
    Named {
        label: label.into(),
        inner: call,
    }
}

/// An [AsyncCall] with an explicit label. Created by [named].
#[derive(Debug)]
pub struct Named<C> {
    label: String,
    inner: C,
}

#[async_trait]
impl<C: AsyncCall> AsyncCall for Named<C> {
    async fn call(self: Box<Self>) -> Result<(), BoxError> {
        Box::new(self.inner).call().await
    }

    fn label(&self) -> &str {
        &self.label
    }
}
