//! The cursor-reading state machine: one [`Task`] per live subscription.
//!
//! `Task<C, T>` is generic over the concrete [`RawCursor`] implementation
//! (`ChangeStreamCursor` or `TailingCursor`) and the caller's target body
//! type `T`; [`TaskHandle`] is the object-safe view the [`crate::Container`]
//! stores so it can hold a heterogeneous set of subscriptions without
//! knowing either type parameter. This is the "state machine over
//! inheritance" shape: one engine, two small strategy functions supplied at
//! construction (`init_cursor`, `to_parts`), rather than two subclasses of
//! an abstract task.

use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
    task::Poll,
};

use bson::Document;
use tokio::task::JoinHandle;

use crate::{
    cursor::RawCursor,
    error::{Error, Result},
    error_handler::{self, ErrorHandler, ExceptionTranslator},
    message::{Converter, FallbackConverter, Message, MessageProperties},
    request::Listener,
    runtime,
};

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The lifecycle state of a [`Task`].
///
/// `Cancelled` is terminal: once reached, a `Task` never runs again. A
/// restart after [`crate::Container::stop`] builds a fresh `Task` from the
/// retained [`crate::request::SubscriptionRequest`] instead of resurrecting
/// this one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Constructed but never executed.
    Created,
    /// Executing, waiting for a healthy cursor.
    Starting,
    /// Draining a healthy cursor and delivering messages.
    Running,
    /// Terminated, either by external cancellation or because the
    /// container stopped.
    Cancelled,
}

/// The object-safe handle a [`crate::Container`] stores in its subscription
/// registry, independent of a task's concrete cursor and body types.
pub(crate) trait TaskHandle: Send + Sync {
    fn state(&self) -> TaskState;
    fn cancel(&self);

    /// Always `true`: signals that this task should be scheduled on a
    /// dedicated long-running worker rather than a bounded queue. Tokio's
    /// work-stealing scheduler does not distinguish between the two, so
    /// this is informational rather than load-bearing, kept only because
    /// the specification calls it out as part of the task contract.
    fn is_long_lived(&self) -> bool {
        true
    }

    fn spawn(self: Arc<Self>) -> JoinHandle<()>;
}

/// The raw, pre-conversion pieces of a message, produced by a task's
/// `to_parts` strategy function.
pub(crate) struct RawParts {
    pub(crate) raw: Option<Document>,
    pub(crate) body: Option<Document>,
    pub(crate) properties: MessageProperties,
}

pub(crate) struct Task<C, T>
where
    C: RawCursor + 'static,
    T: Send + Sync + 'static,
{
    state: Mutex<TaskState>,
    cursor: Mutex<Option<C>>,
    init_cursor: Box<dyn Fn() -> BoxFuture<'static, Result<C>> + Send + Sync>,
    to_parts: Box<dyn Fn(C::Item) -> RawParts + Send + Sync>,
    listener: Listener<T>,
    converter: Arc<dyn Converter<T>>,
    fallback: Option<Arc<dyn FallbackConverter<T>>>,
    error_handler: Arc<dyn ErrorHandler>,
    translator: Option<Arc<dyn ExceptionTranslator>>,
}

impl<C, T> Task<C, T>
where
    C: RawCursor + 'static,
    T: Send + Sync + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        init_cursor: Box<dyn Fn() -> BoxFuture<'static, Result<C>> + Send + Sync>,
        to_parts: Box<dyn Fn(C::Item) -> RawParts + Send + Sync>,
        listener: Listener<T>,
        converter: Arc<dyn Converter<T>>,
        fallback: Option<Arc<dyn FallbackConverter<T>>>,
        error_handler: Arc<dyn ErrorHandler>,
        translator: Option<Arc<dyn ExceptionTranslator>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(TaskState::Created),
            cursor: Mutex::new(None),
            init_cursor,
            to_parts,
            listener,
            converter,
            fallback,
            error_handler,
            translator,
        })
    }

    fn read_state(&self) -> TaskState {
        *self.state.lock().unwrap()
    }

    fn handle_error(&self, err: Error) {
        let translated = error_handler::translate(err, self.translator.as_deref());
        self.error_handler.handle(translated);
    }

    fn build_message(&self, item: C::Item) -> Message<T> {
        let RawParts {
            raw,
            body,
            properties,
        } = (self.to_parts)(item);
        let mut message = Message::new(raw, body, properties, self.converter.clone());
        if let Some(fallback) = &self.fallback {
            message = message.with_fallback(fallback.clone());
        }
        message
    }

    /// Drives the cursor-reading loop described in the specification:
    /// CREATED → STARTING (retry until a healthy cursor is obtained or the
    /// task is cancelled) → RUNNING (non-blocking poll, deliver, or back
    /// off) → returns once CANCELLED is observed.
    async fn run(self: Arc<Self>) {
        {
            let mut state = self.state.lock().unwrap();
            if *state != TaskState::Created {
                return;
            }
            *state = TaskState::Starting;
        }

        loop {
            if self.read_state() != TaskState::Starting {
                return;
            }
            match (self.init_cursor)().await {
                Ok(candidate) if candidate.is_healthy() => {
                    let mut state = self.state.lock().unwrap();
                    if *state != TaskState::Starting {
                        // Cancelled while the cursor was opening; `candidate`
                        // is dropped here, closing it.
                        return;
                    }
                    *self.cursor.lock().unwrap() = Some(candidate);
                    *state = TaskState::Running;
                    break;
                }
                // `candidate` dropped here when unhealthy, closing it.
                Ok(_unhealthy) => {}
                Err(err) => self.handle_error(err),
            }
            runtime::sleep(runtime::STARTUP_BACKOFF).await;
        }

        loop {
            if self.read_state() != TaskState::Running {
                return;
            }
            let polled = {
                let mut cursor = self.cursor.lock().unwrap();
                cursor.as_mut().map(|c| c.try_next())
            };
            match polled {
                Some(Poll::Ready(Ok(Some(item)))) => {
                    let message = self.build_message(item);
                    (self.listener)(message);
                }
                Some(Poll::Ready(Ok(None))) | Some(Poll::Pending) => {
                    runtime::sleep(runtime::EMPTY_POLL_BACKOFF).await;
                }
                Some(Poll::Ready(Err(err))) => self.handle_error(err),
                // The cursor was closed out from under us by a concurrent
                // cancel; exit quietly rather than raising an illegal-state
                // error, since `state` will already have moved to
                // `Cancelled` by the time we observe this.
                None => return,
            }
        }
    }
}

impl<C, T> TaskHandle for Task<C, T>
where
    C: RawCursor + 'static,
    T: Send + Sync + 'static,
{
    fn state(&self) -> TaskState {
        self.read_state()
    }

    fn cancel(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if matches!(*state, TaskState::Starting | TaskState::Running) {
                *state = TaskState::Cancelled;
            }
        }
        // Dropping the cursor here, if present, closes it.
        self.cursor.lock().unwrap().take();
    }

    fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        runtime::spawn(async move { self.run().await })
    }
}
