//! A thin, non-blocking abstraction over the driver's `Stream`-based
//! cursors, standing in for the specification's `Cursor.tryNext()` /
//! `Cursor.getServerCursor()` / `Cursor.close()` contract.

use std::task::Poll;

use bson::Document;
use futures_util::{FutureExt, TryStreamExt};
use mongodb::change_stream::{event::ChangeStreamEvent, ChangeStream};

use crate::error::Result;

/// A source of events a [`crate::task::Task`] can poll without blocking.
///
/// The driver's cursors are `Stream`s, which are inherently async; this
/// trait adapts them to the specification's non-blocking `tryNext()`
/// contract by polling the next-item future once, immediately, via
/// [`futures_util::FutureExt::now_or_never`] rather than genuinely awaiting
/// it. `Poll::Pending` means "nothing available right now", exactly as the
/// Java driver's `tryNext()` returning `null` does.
pub(crate) trait RawCursor: Send {
    /// The item type this cursor yields.
    type Item: Send;

    /// Polls for the next item without blocking.
    fn try_next(&mut self) -> Poll<Result<Option<Self::Item>>>;

    /// The cursor health probe: `true` once the cursor has been confirmed
    /// open on the server.
    fn is_healthy(&self) -> bool;
}

/// Wraps a change-stream cursor opened against the generic `Document` type;
/// the caller's target type is resolved later, lazily, by
/// [`crate::message::Message::body`].
pub(crate) struct ChangeStreamCursor {
    inner: ChangeStream<ChangeStreamEvent<Document>>,
}

impl ChangeStreamCursor {
    pub(crate) fn new(inner: ChangeStream<ChangeStreamEvent<Document>>) -> Self {
        Self { inner }
    }
}

impl RawCursor for ChangeStreamCursor {
    type Item = ChangeStreamEvent<Document>;

    fn try_next(&mut self) -> Poll<Result<Option<Self::Item>>> {
        match self.inner.try_next().now_or_never() {
            Some(Ok(item)) => Poll::Ready(Ok(item)),
            Some(Err(err)) => Poll::Ready(Err(err.into())),
            None => Poll::Pending,
        }
    }

    fn is_healthy(&self) -> bool {
        self.inner.is_alive()
    }
}

/// Wraps a tailable-cursor `find` result.
///
/// The async driver does not expose a raw server cursor id the way the
/// specification's reference (a synchronous driver) does; a cursor that
/// `find()` successfully returned is treated as healthy unconditionally,
/// which is the closest available equivalent (see `DESIGN.md`).
pub(crate) struct TailingCursor {
    inner: mongodb::Cursor<Document>,
}

impl TailingCursor {
    pub(crate) fn new(inner: mongodb::Cursor<Document>) -> Self {
        Self { inner }
    }
}

impl RawCursor for TailingCursor {
    type Item = Document;

    fn try_next(&mut self) -> Poll<Result<Option<Self::Item>>> {
        match self.inner.try_next().now_or_never() {
            Some(Ok(item)) => Poll::Ready(Ok(item)),
            Some(Err(err)) => Poll::Ready(Err(err.into())),
            None => Poll::Pending,
        }
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! An in-process, channel-backed [`RawCursor`] used by unit tests so
    //! they can drive the task state machine without a live `mongod`,
    //! mirroring the driver's own approach of faking the wire layer for
    //! pure-logic tests.

    use tokio::sync::mpsc;

    use super::*;

    pub(crate) struct FakeCursor<T> {
        receiver: mpsc::UnboundedReceiver<Result<T>>,
        healthy: bool,
    }

    impl<T: Send> FakeCursor<T> {
        pub(crate) fn channel(healthy: bool) -> (mpsc::UnboundedSender<Result<T>>, Self) {
            let (sender, receiver) = mpsc::unbounded_channel();
            (sender, Self { receiver, healthy })
        }
    }

    impl<T: Send> RawCursor for FakeCursor<T> {
        type Item = T;

        fn try_next(&mut self) -> Poll<Result<Option<Self::Item>>> {
            match self.receiver.try_recv() {
                Ok(Ok(item)) => Poll::Ready(Ok(Some(item))),
                Ok(Err(err)) => Poll::Ready(Err(err)),
                Err(mpsc::error::TryRecvError::Empty) => Poll::Pending,
                Err(mpsc::error::TryRecvError::Disconnected) => Poll::Ready(Ok(None)),
            }
        }

        fn is_healthy(&self) -> bool {
            self.healthy
        }
    }
}
