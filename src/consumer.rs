use std::fmt;
use std::future::Future;
use std::hint;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread;

use tracing::trace;

use crate::error::{FutureError, GetError, Result};
use crate::exception::{ErrorCode, Exception};
use crate::lock::DualLock;
use crate::node::{ConsumerNode, Status, Waiter};
use crate::storage::{Storage, Tag};

/// Readiness polls `wait` makes before parking the thread.
pub const SPIN_LIMIT: u32 = 64;

/// The receiving half of a pair.
///
/// Retrieval is destructive: once [`get`](Consumer::get) (or a consuming
/// `get_error`/`get_exception`) returns, the consumer is spent and further
/// retrieval fails with [`FutureError::NoState`].
///
/// A consumer can also be `.await`ed; the output is the same as `get`.
///
/// ```
/// use promise_link::pair;
/// use futures::executor::block_on;
/// use std::thread;
///
/// let (mut producer, consumer) = pair::<u32>();
/// let task = thread::spawn(move || block_on(consumer));
/// producer.set_value(7).unwrap();
/// assert_eq!(task.join().expect("The task thread has panicked").unwrap(), 7);
/// ```
pub struct Consumer<R> {
    node: Option<Arc<ConsumerNode<R>>>,
}

impl<R> Consumer<R> {
    pub(crate) fn linked(node: Arc<ConsumerNode<R>>) -> Self {
        Consumer { node: Some(node) }
    }

    fn status(&self) -> Option<Status> {
        self.node.as_deref().map(|node| node.lock().status())
    }

    fn tag(&self) -> Tag {
        self.status().map_or(Tag::Empty, Status::tag)
    }

    /// Still linked to a producer, or holding a result not yet retrieved.
    pub fn is_valid(&self) -> bool {
        self.status().map_or(false, Status::is_valid)
    }

    pub fn is_ready(&self) -> bool {
        self.tag() != Tag::Empty
    }

    pub fn has_value(&self) -> bool {
        self.tag() == Tag::Value
    }

    pub fn has_error(&self) -> bool {
        self.tag() == Tag::Error
    }

    /// True for stored exceptions and for stored error codes alike.
    pub fn has_exception(&self) -> bool {
        matches!(self.tag(), Tag::Exception | Tag::Error)
    }

    /// Blocks until a result is available.
    pub fn wait(&self) -> Result<()> {
        let node = self.node.as_deref().ok_or(FutureError::NoState)?;
        let mut spins = 0;
        loop {
            let status = node.lock().status();
            if status.is_ready() {
                return Ok(());
            }
            if !status.is_valid() {
                return Err(FutureError::NoState);
            }
            if spins < SPIN_LIMIT {
                spins += 1;
                hint::spin_loop();
                continue;
            }
            if register(node, Waiter::Thread(thread::current())) {
                thread::park();
            }
        }
    }

    /// Takes the result out if `wanted` accepts its tag, unlinking both
    /// sides and spending this consumer and its producer. Otherwise leaves it
    /// untouched and returns `Storage::Empty`.
    fn retrieve(&mut self, wanted: impl FnOnce(Tag) -> bool) -> Result<Storage<R>> {
        self.wait()?;
        let node = self.node.as_deref().ok_or(FutureError::NoState)?;
        let taken = {
            let mut guard = DualLock::consumer(node);
            let (producer, state) = guard.split();
            let state = state.ok_or(FutureError::NoState)?;
            if !wanted(state.storage.tag()) {
                return Ok(Storage::Empty);
            }
            if let Some(producer) = producer {
                *producer = Storage::Spent;
            }
            state.producer = None;
            state.storage.take()
        };
        trace!(consumer = ?(node as *const ConsumerNode<R>), "result retrieved");
        self.node = None;
        Ok(taken)
    }

    /// Waits for and takes the result.
    pub fn get(&mut self) -> std::result::Result<R, GetError> {
        match self.retrieve(|_| true)? {
            Storage::Value(value) => Ok(value),
            Storage::Error(code) => Err(GetError::Code(code)),
            Storage::Exception(exception) => Err(GetError::Exception(exception)),
            Storage::Empty | Storage::Linked(_) | Storage::Spent => Err(FutureError::NoState.into()),
        }
    }

    /// Waits, then takes the result only if it is a failure. An error code is
    /// handed back wrapped as an exception. A value is left in place.
    pub fn get_exception(&mut self) -> Result<Option<Exception>> {
        let taken = self.retrieve(|tag| matches!(tag, Tag::Exception | Tag::Error))?;
        Ok(match taken {
            Storage::Exception(exception) => Some(exception),
            Storage::Error(code) => Some(Exception::new(code)),
            _ => None,
        })
    }

    /// Waits, then takes the result only if it is an error code.
    pub fn get_error(&mut self) -> Result<Option<ErrorCode>> {
        let taken = self.retrieve(|tag| tag == Tag::Error)?;
        Ok(match taken {
            Storage::Error(code) => Some(code),
            _ => None,
        })
    }

    /// Moves this consumer out, leaving an invalid one behind.
    pub fn take(&mut self) -> Consumer<R> {
        mem::take(self)
    }

    pub fn swap(&mut self, other: &mut Consumer<R>) {
        mem::swap(&mut self.node, &mut other.node);
    }
}

/// Parks `waiter` on the consumer unless a result already arrived.
fn register<R>(node: &ConsumerNode<R>, waiter: Waiter) -> bool {
    let mut guard = DualLock::consumer(node);
    match guard.consumer_state() {
        Some(state) if state.storage.is_empty() => {
            state.waiter = waiter;
            true
        }
        _ => false,
    }
}

impl<R> Default for Consumer<R> {
    fn default() -> Self {
        Consumer { node: None }
    }
}

impl<R> Drop for Consumer<R> {
    fn drop(&mut self) {
        let Some(node) = self.node.take() else {
            return;
        };
        let mut guard = DualLock::consumer(&node);
        let (producer, state) = guard.split();
        let Some(state) = state else {
            return;
        };
        if let Some(producer) = producer {
            // a producer that already delivered stays satisfied
            if state.storage.is_empty() {
                producer.reset();
            } else {
                *producer = Storage::Spent;
            }
            trace!(consumer = ?Arc::as_ptr(&node), "dropped while linked");
        }
        state.producer = None;
        state.storage.reset();
    }
}

impl<R> Future for Consumer<R> {
    type Output = std::result::Result<R, GetError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let pending = match self.node.as_deref() {
            None => return Poll::Ready(Err(FutureError::NoState.into())),
            Some(node) => {
                let status = node.lock().status();
                !status.is_ready()
                    && status.is_valid()
                    && register(node, Waiter::Task(cx.waker().clone()))
            }
        };
        if pending {
            Poll::Pending
        } else {
            Poll::Ready(self.get())
        }
    }
}

impl<R> fmt::Debug for Consumer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("valid", &self.is_valid())
            .field("state", &self.tag())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pair, Producer};

    #[test]
    fn default_consumer_has_no_state() {
        let mut consumer = Consumer::<u8>::default();
        assert!(!consumer.is_valid());
        assert!(!consumer.is_ready());
        assert_eq!(consumer.wait(), Err(FutureError::NoState));
        assert!(matches!(consumer.get(), Err(GetError::Future(FutureError::NoState))));
    }

    #[test]
    fn queries_follow_the_stored_result() {
        let (mut producer, consumer) = pair::<u8>();
        assert!(consumer.is_valid());
        assert!(!consumer.is_ready());
        producer.set_error(ErrorCode::new(11).unwrap()).unwrap();
        assert!(consumer.is_ready());
        assert!(consumer.has_error());
        assert!(consumer.has_exception());
        assert!(!consumer.has_value());
    }

    #[test]
    fn get_is_single_shot() {
        let (mut producer, mut consumer) = pair::<Vec<u8>>();
        producer.set_value(vec![1, 2]).unwrap();
        assert_eq!(consumer.get().unwrap(), [1, 2]);
        assert!(!consumer.is_valid());
        assert!(!producer.has_consumer());
        assert!(matches!(consumer.get(), Err(GetError::Future(FutureError::NoState))));
    }

    #[test]
    fn error_code_surfaces_as_code() {
        let (mut producer, mut consumer) = pair::<u8>();
        let code = ErrorCode::new(2).unwrap();
        producer.set_error(code).unwrap();
        match consumer.get() {
            Err(GetError::Code(got)) => assert_eq!(got, code),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn get_error_leaves_values_alone() {
        let (mut producer, mut consumer) = pair::<u8>();
        producer.set_value(4).unwrap();
        assert_eq!(consumer.get_error().unwrap(), None);
        assert_eq!(consumer.get_exception().unwrap().map(|e| e.to_string()), None);
        assert!(consumer.is_valid());
        assert_eq!(consumer.get().unwrap(), 4);
    }

    #[test]
    fn get_exception_wraps_error_codes() {
        let (mut producer, mut consumer) = pair::<u8>();
        let code = ErrorCode::new(2).unwrap();
        producer.set_error(code).unwrap();
        let exception = consumer.get_exception().unwrap().unwrap();
        assert_eq!(exception.downcast_ref::<ErrorCode>(), Some(&code));
        assert!(!consumer.is_valid());
        assert_eq!(consumer.get_error(), Err(FutureError::NoState));
    }

    #[test]
    fn dropping_consumer_clears_producer_link() {
        let mut producer = Producer::<u8>::new();
        let consumer = producer.get_consumer().unwrap();
        producer.set_value(1).unwrap();
        drop(consumer);
        assert!(!producer.has_consumer());
    }

    #[test]
    fn swap_and_take_relocate_the_handle() {
        let (mut p1, mut c1) = pair::<u8>();
        let (mut p2, mut c2) = pair::<u8>();
        c1.swap(&mut c2);
        p1.set_value(1).unwrap();
        p2.set_value(2).unwrap();
        let mut moved = c1.take();
        assert!(!c1.is_valid());
        assert_eq!(moved.get().unwrap(), 2);
        assert_eq!(c2.get().unwrap(), 1);
    }

    #[test]
    fn debug_shows_state() {
        let (mut producer, consumer) = pair::<u8>();
        producer.set_value(1).unwrap();
        assert_eq!(format!("{consumer:?}"), "Consumer { valid: true, state: Value }");
    }
}
