//! A long-lived container for subscribing to MongoDB change streams and
//! tailable cursors on capped collections.
//!
//! Application code builds a [`request::SubscriptionRequest`] (a listener
//! callback plus [`options::RequestOptions`] describing what to subscribe
//! to), hands it to [`Container::register`], and calls [`Container::start`]
//! when it is ready to receive events. Each registered subscription runs on
//! its own long-lived worker, draining its cursor and delivering messages
//! to the listener until [`Container::stop`] or [`Subscription::cancel`]
//! cancels it.
//!
//! This crate builds on the official [`mongodb`] driver; it does not speak
//! the wire protocol itself.
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod container;
mod cursor;
pub mod error;
pub mod error_handler;
mod filter;
pub mod message;
pub mod options;
pub mod request;
mod runtime;
mod subscription;
mod task;
mod task_factory;

pub use bson;
pub use mongodb;

pub use crate::{
    container::Container,
    error::{Error, ErrorKind, Result},
    error_handler::{ErrorHandler, ExceptionTranslator, LoggingErrorHandler},
    message::{Converter, FallbackConverter, Message, MessageProperties, SerdeConverter},
    options::{
        ChangeStreamFilter, ChangeStreamOptions, FullDocumentLookup, RequestOptions,
        TailingOptions, TailingQuery,
    },
    request::{Listener, SubscriptionRequest},
    subscription::Subscription,
};
