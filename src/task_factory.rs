//! Dispatches a [`SubscriptionRequest`] to the matching concrete [`Task`]
//! implementation.
//!
//! This is the specification's `TaskFactory`: given a request and its
//! target body type (carried as the request's own type parameter, since
//! Rust resolves that statically rather than at runtime), build the
//! [`ChangeStreamCursor`]- or [`TailingCursor`]-backed task that will serve
//! it.

use std::{any::TypeId, sync::Arc};

use bson::Document;
use mongodb::{
    change_stream::event::ChangeStreamEvent,
    options::{CursorType, FullDocumentType},
    Database,
};
use serde::de::DeserializeOwned;

use crate::{
    cursor::{ChangeStreamCursor, TailingCursor},
    error::{Error, Result},
    error_handler::{ErrorHandler, ExceptionTranslator},
    filter,
    message::MessageProperties,
    options::{ChangeStreamOptions, FullDocumentLookup, RequestOptions, TailingOptions},
    request::SubscriptionRequest,
    task::{BoxFuture, RawParts, Task, TaskHandle},
};

/// Builds the [`TaskHandle`] that will serve `request` once spawned.
///
/// Configuration errors (an unknown request variant would be one, but the
/// `RequestOptions` enum makes that unrepresentable in this crate) are
/// reserved for the day a third variant is added; today this never fails,
/// but keeps the `Result` return type the specification calls for.
pub(crate) fn build_task<T>(
    db: Database,
    request: SubscriptionRequest<T>,
    error_handler: Arc<dyn ErrorHandler>,
    translator: Option<Arc<dyn ExceptionTranslator>>,
) -> Result<Arc<dyn TaskHandle>>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    match request.options {
        RequestOptions::ChangeStream(options) => {
            let wants_typed_body = TypeId::of::<T>() != TypeId::of::<Document>();
            let init = change_stream_init(db, options, wants_typed_body);
            let to_parts: Box<dyn Fn(ChangeStreamEvent<Document>) -> RawParts + Send + Sync> =
                Box::new(change_stream_to_parts);
            Ok(Task::new(
                init,
                to_parts,
                request.listener,
                request.converter,
                request.fallback,
                error_handler,
                translator,
            ) as Arc<dyn TaskHandle>)
        }
        RequestOptions::Tailing(options) => {
            let database_name = db.name().to_string();
            let collection_name = options.collection_name().to_string();
            let init = tailing_init(db, options);
            let to_parts: Box<dyn Fn(Document) -> RawParts + Send + Sync> = Box::new(move |doc| {
                tailing_to_parts(doc, database_name.clone(), collection_name.clone())
            });
            Ok(Task::new(
                init,
                to_parts,
                request.listener,
                request.converter,
                request.fallback,
                error_handler,
                translator,
            ) as Arc<dyn TaskHandle>)
        }
    }
}

fn change_stream_init(
    db: Database,
    options: ChangeStreamOptions,
    wants_typed_body: bool,
) -> Box<dyn Fn() -> BoxFuture<'static, Result<ChangeStreamCursor>> + Send + Sync> {
    Box::new(move || {
        let db = db.clone();
        let options = options.clone();
        Box::pin(async move {
            let coll = db.collection::<Document>(options.collection_name());
            let pipeline = filter::compile(options.filter.clone());

            // Updates without full-document lookup cannot be mapped into a
            // typed target, so default to UPDATE_LOOKUP whenever the caller
            // asked for anything other than the generic `Document` body.
            let full_document = options.full_document_lookup.unwrap_or(if wants_typed_body {
                FullDocumentLookup::UpdateLookup
            } else {
                FullDocumentLookup::Default
            });

            let mut watch = coll.watch();
            if let Some(pipeline) = pipeline {
                watch = watch.pipeline(pipeline);
            }
            if let Some(resume_token) = options.resume_token.clone() {
                let resume_token: mongodb::change_stream::event::ResumeToken =
                    bson::from_document(resume_token)
                        .map_err(|_| Error::conversion("Document", "ResumeToken"))?;
                watch = watch.resume_after(resume_token);
            }
            if let Some(collation) = options.collation.clone() {
                watch = watch.collation(collation);
            }
            if let Some(full_document) = Option::<FullDocumentType>::from(full_document) {
                watch = watch.full_document(full_document);
            }

            let stream = watch.await?;
            Ok(ChangeStreamCursor::new(stream))
        })
    })
}

fn tailing_init(
    db: Database,
    options: TailingOptions,
) -> Box<dyn Fn() -> BoxFuture<'static, Result<TailingCursor>> + Send + Sync> {
    Box::new(move || {
        let db = db.clone();
        let options = options.clone();
        Box::pin(async move {
            let coll = db.collection::<Document>(options.collection_name());
            let filter = options
                .query
                .as_ref()
                .map(|query| query.filter.clone())
                .unwrap_or_default();

            let mut find = coll
                .find(filter)
                .cursor_type(CursorType::TailableAwait)
                .no_cursor_timeout(true);
            if let Some(collation) = options.query.as_ref().and_then(|q| q.collation.clone()) {
                find = find.collation(collation);
            }

            let cursor = find.await?;
            Ok(TailingCursor::new(cursor))
        })
    })
}

fn change_stream_to_parts(event: ChangeStreamEvent<Document>) -> RawParts {
    let raw = bson::to_document(&event).ok();
    let body = event.full_document;
    let properties = match event.ns {
        Some(ns) => MessageProperties::new(Some(ns.db), ns.coll),
        None => MessageProperties::unknown(),
    };
    RawParts {
        raw,
        body,
        properties,
    }
}

fn tailing_to_parts(doc: Document, database_name: String, collection_name: String) -> RawParts {
    RawParts {
        raw: Some(doc.clone()),
        body: Some(doc),
        properties: MessageProperties::new(Some(database_name), Some(collection_name)),
    }
}
