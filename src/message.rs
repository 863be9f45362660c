//! The [`Message`] type delivered to subscription listeners, and the
//! conversion seam used to turn a raw document into a caller-chosen target
//! type.

use std::{marker::PhantomData, sync::Arc};

use bson::Document;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// The database and collection a [`Message`] originated from.
///
/// Both fields are `None` when the originating event carried no namespace
/// (for example, a change-stream `invalidate` event); callers that need a
/// display-friendly name should fall back to `"unknown"` themselves, as
/// [`MessageProperties::database_name_or_unknown`] and its collection
/// counterpart do.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageProperties {
    pub(crate) database_name: Option<String>,
    pub(crate) collection_name: Option<String>,
}

impl MessageProperties {
    pub(crate) fn new(database_name: Option<String>, collection_name: Option<String>) -> Self {
        Self {
            database_name,
            collection_name,
        }
    }

    pub(crate) fn unknown() -> Self {
        Self::default()
    }

    /// The source database name, if the originating event carried one.
    pub fn database_name(&self) -> Option<&str> {
        self.database_name.as_deref()
    }

    /// The source collection name, if the originating event carried one.
    pub fn collection_name(&self) -> Option<&str> {
        self.collection_name.as_deref()
    }

    /// The source database name, or the literal string `"unknown"` if the
    /// originating event carried no namespace.
    pub fn database_name_or_unknown(&self) -> &str {
        self.database_name.as_deref().unwrap_or("unknown")
    }

    /// The source collection name, or the literal string `"unknown"` if the
    /// originating event carried no namespace.
    pub fn collection_name_or_unknown(&self) -> &str {
        self.collection_name.as_deref().unwrap_or("unknown")
    }
}

/// Converts a raw [`bson::Document`] body into a target type `T`.
///
/// This is the internal stand-in for the object-document mapper's
/// `converter.read(TargetType, Document)` described in the specification:
/// an external collaborator this crate does not implement, only depends on
/// the shape of. The default implementation, [`SerdeConverter`], uses
/// `bson`'s `Deserialize` support.
pub trait Converter<T>: Send + Sync {
    /// Converts `doc` into a `T`, or fails naming both types.
    fn convert(&self, doc: Document) -> Result<T>;
}

/// The default [`Converter`]: deserializes via `serde`/`bson`, exactly as
/// `Collection<T>::find` does internally. Covers both the "body is already
/// the target type" case (when `T = Document`, this is an identity
/// deserialize) and the general typed case.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerdeConverter;

impl<T: DeserializeOwned> Converter<T> for SerdeConverter {
    fn convert(&self, doc: Document) -> Result<T> {
        bson::from_document(doc)
            .map_err(|_| Error::conversion("Document", std::any::type_name::<T>()))
    }
}

/// A secondary conversion attempt consulted only if the primary
/// [`Converter`] fails, standing in for the object mapper's
/// `ConversionService.canConvert`/`convert` fallback path in step 3 of the
/// lazy-conversion algorithm. Unused unless a [`Message`] is built with
/// [`Message::with_fallback`].
pub trait FallbackConverter<T>: Send + Sync {
    /// Attempts the fallback conversion; returns `None` to indicate no
    /// applicable conversion exists (not even an error — just "not my
    /// job").
    fn try_convert(&self, doc: &Document) -> Option<T>;
}

/// A change event or tailed document, delivered to a subscription listener.
///
/// `Message` is the crate's single concrete message type, combining what
/// the specification describes as the base `Message` and its
/// `LazyConvertingMessage` variant: there is only one kind of message this
/// crate ever constructs, so a separate base trait would add a layer with
/// no second implementation.
///
/// `body()` performs the conversion on every call (no caching), matching
/// the callback-delivery contract: conversion failures surface to whoever
/// calls `body()`, not to the task loop that already delivered the message.
pub struct Message<T> {
    raw: Option<Document>,
    body: Option<Document>,
    properties: MessageProperties,
    converter: Arc<dyn Converter<T>>,
    fallback: Option<Arc<dyn FallbackConverter<T>>>,
    _target: PhantomData<fn() -> T>,
}

impl<T> Message<T> {
    pub(crate) fn new(
        raw: Option<Document>,
        body: Option<Document>,
        properties: MessageProperties,
        converter: Arc<dyn Converter<T>>,
    ) -> Self {
        Self {
            raw,
            body,
            properties,
            converter,
            fallback: None,
            _target: PhantomData,
        }
    }

    /// Attaches a [`FallbackConverter`] consulted when the primary converter
    /// fails to produce `T`.
    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackConverter<T>>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// The unmodified event as emitted by the source cursor. `None` on
    /// synthetic events that carry no underlying document.
    pub fn raw(&self) -> Option<&Document> {
        self.raw.as_ref()
    }

    /// The database and collection this message originated from.
    pub fn properties(&self) -> &MessageProperties {
        &self.properties
    }

    /// Converts and returns the message body, or `Ok(None)` if the
    /// underlying event carried no document (for example, an update without
    /// full-document lookup enabled).
    ///
    /// Conversion runs on every call; callers that need the converted value
    /// more than once should store the result themselves.
    pub fn body(&self) -> Result<Option<T>> {
        let Some(doc) = self.body.clone() else {
            return Ok(None);
        };
        match self.converter.convert(doc.clone()) {
            Ok(value) => Ok(Some(value)),
            Err(err) => match &self.fallback {
                Some(fallback) => match fallback.try_convert(&doc) {
                    Some(value) => Ok(Some(value)),
                    None => Err(err),
                },
                None => Err(err),
            },
        }
    }
}

impl<T> std::fmt::Debug for Message<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("raw", &self.raw)
            .field("body", &self.body)
            .field("properties", &self.properties)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bson::doc;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Person {
        #[serde(rename = "_id")]
        id: String,
        firstname: String,
    }

    struct CountingConverter(AtomicUsize);

    impl Converter<Person> for CountingConverter {
        fn convert(&self, doc: Document) -> Result<Person> {
            self.0.fetch_add(1, Ordering::SeqCst);
            bson::from_document(doc).map_err(|_| Error::conversion("Document", "Person"))
        }
    }

    #[test]
    fn document_target_passes_body_through() {
        let body = doc! { "_id": "id-1", "firstname": "foo" };
        let message: Message<Document> =
            Message::new(None, Some(body.clone()), MessageProperties::unknown(), Arc::new(SerdeConverter));
        assert_eq!(message.body().unwrap(), Some(body));
    }

    #[test]
    fn typed_target_deserializes_body() {
        let body = doc! { "_id": "id-1", "firstname": "foo" };
        let message: Message<Person> =
            Message::new(None, Some(body), MessageProperties::unknown(), Arc::new(SerdeConverter));
        assert_eq!(
            message.body().unwrap(),
            Some(Person {
                id: "id-1".into(),
                firstname: "foo".into(),
            })
        );
    }

    #[test]
    fn null_body_converts_to_none_without_invoking_converter() {
        let converter = Arc::new(CountingConverter(AtomicUsize::new(0)));
        let message: Message<Person> =
            Message::new(None, None, MessageProperties::unknown(), converter.clone());
        assert_eq!(message.body().unwrap(), None);
        assert_eq!(converter.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn conversion_runs_on_every_call_not_cached() {
        let converter = Arc::new(CountingConverter(AtomicUsize::new(0)));
        let body = doc! { "_id": "id-1", "firstname": "foo" };
        let message: Message<Person> =
            Message::new(None, Some(body), MessageProperties::unknown(), converter.clone());
        let _ = message.body();
        let _ = message.body();
        assert_eq!(converter.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn fallback_converter_used_when_primary_fails() {
        struct AlwaysFails;
        impl Converter<Person> for AlwaysFails {
            fn convert(&self, _doc: Document) -> Result<Person> {
                Err(Error::conversion("Document", "Person"))
            }
        }
        struct Fallback;
        impl FallbackConverter<Person> for Fallback {
            fn try_convert(&self, doc: &Document) -> Option<Person> {
                Some(Person {
                    id: doc.get_str("_id").ok()?.to_string(),
                    firstname: "fallback".into(),
                })
            }
        }

        let body = doc! { "_id": "id-1" };
        let message: Message<Person> =
            Message::new(None, Some(body), MessageProperties::unknown(), Arc::new(AlwaysFails))
                .with_fallback(Arc::new(Fallback));
        assert_eq!(
            message.body().unwrap(),
            Some(Person {
                id: "id-1".into(),
                firstname: "fallback".into(),
            })
        );
    }

    #[test]
    fn properties_default_to_unknown_literal() {
        let properties = MessageProperties::unknown();
        assert_eq!(properties.database_name_or_unknown(), "unknown");
        assert_eq!(properties.collection_name_or_unknown(), "unknown");
    }
}
