//! Immutable configuration for a single subscription.
//!
//! Each variant is built with a fluent [`typed_builder::TypedBuilder`]
//! builder; `build()` produces a frozen, `Clone`-able snapshot that is safe
//! to hand to [`crate::Container::register`] more than once.

use bson::Document;
use mongodb::options::Collation;
use typed_builder::TypedBuilder;

/// The shape a change-stream filter can take.
///
/// A structured [`ChangeStreamFilter::Aggregation`] is compiled by
/// [`crate::filter::compile`]: every non-`$` field reference is prefixed
/// with `fullDocument.`, recursively, because change-event envelopes nest
/// the user document there. A [`ChangeStreamFilter::Pipeline`] is assumed
/// already compiled and is passed through untouched.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeStreamFilter {
    /// A pre-compiled aggregation pipeline, used as-is.
    Pipeline(Vec<Document>),
    /// A structured aggregation over user-document fields, rewritten to
    /// reference `fullDocument.<field>` before being sent to the server.
    Aggregation(Vec<Document>),
}

/// Whether the server should attach the post-image document to update
/// events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FullDocumentLookup {
    /// Use the server's default behavior (no post-image on updates).
    Default,
    /// Request the post-image on update events.
    UpdateLookup,
}

impl From<FullDocumentLookup> for Option<mongodb::options::FullDocumentType> {
    fn from(value: FullDocumentLookup) -> Self {
        match value {
            FullDocumentLookup::Default => None,
            FullDocumentLookup::UpdateLookup => Some(mongodb::options::FullDocumentType::UpdateLookup),
        }
    }
}

/// Options describing a change-data-capture subscription on a single
/// collection.
#[derive(Clone, Debug, TypedBuilder)]
pub struct ChangeStreamOptions {
    /// The collection to watch.
    #[builder(setter(into))]
    pub(crate) collection_name: String,

    /// The filter to apply, if any. See [`ChangeStreamFilter`].
    #[builder(default, setter(strip_option))]
    pub(crate) filter: Option<ChangeStreamFilter>,

    /// An opaque resume token to continue the stream from, as previously
    /// returned by a prior subscription's resume token.
    #[builder(default, setter(strip_option))]
    pub(crate) resume_token: Option<Document>,

    /// Whether update events should carry their post-image. If unset, the
    /// container chooses [`FullDocumentLookup::UpdateLookup`] when the
    /// caller subscribes with a non-`Document` target type, and
    /// [`FullDocumentLookup::Default`] otherwise.
    #[builder(default, setter(strip_option))]
    pub(crate) full_document_lookup: Option<FullDocumentLookup>,

    /// Collation to apply to the change stream.
    #[builder(default, setter(strip_option))]
    pub(crate) collation: Option<Collation>,
}

impl ChangeStreamOptions {
    /// The collection this subscription watches.
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }
}

/// A filter and collation applied to a tailable-cursor subscription.
#[derive(Clone, Debug, Default)]
pub struct TailingQuery {
    /// The query document used to open the `find` cursor.
    pub filter: Document,
    /// Collation to apply to the query, if any.
    pub collation: Option<Collation>,
}

/// Options describing a tailable-cursor subscription on a capped
/// collection.
#[derive(Clone, Debug, TypedBuilder)]
pub struct TailingOptions {
    /// The capped collection to tail.
    #[builder(setter(into))]
    pub(crate) collection_name: String,

    /// The ordering query applied to the tail, if any.
    #[builder(default, setter(strip_option))]
    pub(crate) query: Option<TailingQuery>,
}

impl TailingOptions {
    /// The collection this subscription tails.
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }
}

/// The two kinds of subscription this crate supports: change-data-capture
/// streams, and append-only tail-follow cursors on capped collections.
#[derive(Clone, Debug)]
pub enum RequestOptions {
    /// A change-data-capture subscription. See [`ChangeStreamOptions`].
    ChangeStream(ChangeStreamOptions),
    /// A tailable-cursor subscription. See [`TailingOptions`].
    Tailing(TailingOptions),
}

impl RequestOptions {
    /// The collection named by either variant.
    pub fn collection_name(&self) -> &str {
        match self {
            RequestOptions::ChangeStream(opts) => opts.collection_name(),
            RequestOptions::Tailing(opts) => opts.collection_name(),
        }
    }
}

impl From<ChangeStreamOptions> for RequestOptions {
    fn from(options: ChangeStreamOptions) -> Self {
        RequestOptions::ChangeStream(options)
    }
}

impl From<TailingOptions> for RequestOptions {
    fn from(options: TailingOptions) -> Self {
        RequestOptions::Tailing(options)
    }
}
