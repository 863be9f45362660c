//! Compiles structured change-stream filters into the pipeline shape the
//! server expects.

use bson::{Bson, Document};

use crate::options::ChangeStreamFilter;

/// Resolves a [`ChangeStreamFilter`] into the pipeline that should be passed
/// to `Collection::watch`.
///
/// A pre-compiled [`ChangeStreamFilter::Pipeline`] is passed through
/// untouched. A structured [`ChangeStreamFilter::Aggregation`] has every
/// field reference prefixed with `fullDocument.`, recursively into nested
/// documents and documents inside arrays, since change-event envelopes nest
/// the user document there. Keys that already start with `$` (stage names,
/// operators) are left alone.
pub(crate) fn compile(filter: Option<ChangeStreamFilter>) -> Option<Vec<Document>> {
    match filter {
        None => None,
        Some(ChangeStreamFilter::Pipeline(pipeline)) => Some(pipeline),
        Some(ChangeStreamFilter::Aggregation(pipeline)) => {
            Some(pipeline.into_iter().map(prefix_document).collect())
        }
    }
}

fn prefix_document(doc: Document) -> Document {
    doc.into_iter()
        .map(|(key, value)| {
            let key = if key.starts_with('$') {
                key
            } else {
                format!("fullDocument.{key}")
            };
            (key, prefix_value(value))
        })
        .collect()
}

fn prefix_value(value: Bson) -> Bson {
    match value {
        Bson::Document(doc) => Bson::Document(prefix_document(doc)),
        Bson::Array(values) => Bson::Array(values.into_iter().map(prefix_value).collect()),
        other => other,
    }
}

#[cfg(test)]
mod test {
    use bson::doc;

    use super::*;

    #[test]
    fn passes_precompiled_pipeline_through_untouched() {
        let pipeline = vec![doc! { "$match": { "a": 1 } }];
        let compiled = compile(Some(ChangeStreamFilter::Pipeline(pipeline.clone())));
        assert_eq!(compiled, Some(pipeline));
    }

    #[test]
    fn prefixes_user_fields_but_not_operators() {
        let pipeline = vec![doc! {
            "$match": {
                "a": 1,
                "b.c": 2,
                "$or": [ { "a": { "$eq": 5 } } ],
            }
        }];
        let compiled = compile(Some(ChangeStreamFilter::Aggregation(pipeline))).unwrap();
        let expected = vec![doc! {
            "$match": {
                "fullDocument.a": 1,
                "fullDocument.b.c": 2,
                "$or": [ { "fullDocument.a": { "$eq": 5 } } ],
            }
        }];
        assert_eq!(compiled, expected);
    }

    #[test]
    fn none_filter_compiles_to_none() {
        assert_eq!(compile(None), None);
    }
}
