//! Binds a listener callback to a [`RequestOptions`] and, optionally, a
//! non-default conversion strategy.

use std::sync::Arc;

use crate::{
    message::{Converter, FallbackConverter, Message, SerdeConverter},
    options::RequestOptions,
};

/// A subscription listener: invoked synchronously, once per delivered
/// message, on the task's own worker. Long-running listeners block that
/// subscription's progress but not any other subscription's.
pub type Listener<T> = Arc<dyn Fn(Message<T>) + Send + Sync>;

/// Binds a listener to the options describing what it should receive.
///
/// Build with [`SubscriptionRequest::new`] and pass to
/// [`crate::Container::register`]. The target body type `T` plays the role
/// of the specification's `bodyType` parameter: it is inferred from the
/// listener's argument type, so there is no separate runtime parameter to
/// pass.
pub struct SubscriptionRequest<T> {
    pub(crate) listener: Listener<T>,
    pub(crate) options: RequestOptions,
    pub(crate) converter: Arc<dyn Converter<T>>,
    pub(crate) fallback: Option<Arc<dyn FallbackConverter<T>>>,
}

impl<T> SubscriptionRequest<T>
where
    T: serde::de::DeserializeOwned + Send + Sync + 'static,
{
    /// Creates a request with the default [`SerdeConverter`] body
    /// conversion strategy.
    pub fn new(options: impl Into<RequestOptions>, listener: impl Fn(Message<T>) + Send + Sync + 'static) -> Self {
        Self {
            listener: Arc::new(listener),
            options: options.into(),
            converter: Arc::new(SerdeConverter),
            fallback: None,
        }
    }

    /// Overrides the default body converter.
    pub fn with_converter(mut self, converter: Arc<dyn Converter<T>>) -> Self {
        self.converter = converter;
        self
    }

    /// Attaches a fallback conversion strategy, consulted when the primary
    /// converter fails to produce `T`.
    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackConverter<T>>) -> Self {
        self.fallback = Some(fallback);
        self
    }
}
