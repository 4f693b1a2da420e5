use std::error::Error as StdError;
use std::fmt;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::consumer::Consumer;
use crate::error::{FutureError, Result};
use crate::exception::{ErrorCode, Exception};
use crate::lock::DualLock;
use crate::node::{ConsumerState, ProducerNode};
use crate::storage::Storage;

/// The supplying half of a pair.
///
/// A fresh producer is `Local`: its result sits inline and nothing is
/// locked or allocated. [`get_consumer`](Producer::get_consumer) moves it to
/// `Shared` for good, after which every operation goes through the dual lock.
///
/// # Examples
///
/// ```
/// use promise_link::Producer;
/// use std::thread;
///
/// let mut producer = Producer::<String>::new();
/// let mut consumer = producer.get_consumer().unwrap();
/// let task = thread::spawn(move || consumer.get().unwrap());
/// producer.set_value("🍓".into()).unwrap();
/// assert_eq!(task.join().expect("The consumer thread has panicked"), "🍓");
/// ```
pub struct Producer<R> {
    state: State<R>,
}

enum State<R> {
    Local(Storage<R>),
    Shared(Arc<ProducerNode<R>>),
}

impl<R> Producer<R> {
    pub const fn new() -> Self {
        Producer {
            state: State::Local(Storage::Empty),
        }
    }

    /// Hands out the one consumer this producer will ever have.
    ///
    /// Whatever was already set moves across with it.
    pub fn get_consumer(&mut self) -> Result<Consumer<R>> {
        let storage = match &mut self.state {
            State::Local(storage) => storage.take(),
            State::Shared(_) => return Err(FutureError::AlreadyRetrieved),
        };
        Ok(self.link(storage))
    }

    /// A producer that has already handed out its consumer.
    pub(crate) fn with_consumer() -> (Producer<R>, Consumer<R>) {
        let mut producer = Producer::new();
        let consumer = producer.link(Storage::Empty);
        (producer, consumer)
    }

    fn link(&mut self, storage: Storage<R>) -> Consumer<R> {
        let node: Arc<ProducerNode<R>> = Arc::new(Mutex::new(Storage::Empty));
        let consumer = Arc::new(Mutex::new(ConsumerState::new(storage, Arc::clone(&node))));
        {
            let mut guard = DualLock::producer(&node);
            if let Some(own) = guard.producer_storage() {
                *own = Storage::Linked(Arc::clone(&consumer));
            }
        }
        trace!(producer = ?Arc::as_ptr(&node), consumer = ?Arc::as_ptr(&consumer), "linked");
        self.state = State::Shared(node);
        Consumer::linked(consumer)
    }

    /// Whether the consumer is still attached.
    pub fn has_consumer(&self) -> bool {
        match &self.state {
            State::Local(_) => false,
            State::Shared(node) => DualLock::producer(node)
                .producer_storage()
                .map_or(false, |own| own.linked().is_some()),
        }
    }

    /// Whether locking has been switched on, i.e. a consumer was handed out.
    pub fn is_shared(&self) -> bool {
        matches!(self.state, State::Shared(_))
    }

    fn satisfy(&mut self, set: impl FnOnce(&mut Storage<R>) -> Result<()>) -> Result<()> {
        match &mut self.state {
            State::Local(storage) => set(storage),
            State::Shared(node) => {
                let mut guard = DualLock::producer(node);
                match guard.authoritative() {
                    Some(storage) => set(storage),
                    None => Err(FutureError::NoState),
                }
            }
        }
    }

    pub fn set_value(&mut self, value: R) -> Result<()> {
        self.satisfy(|storage| storage.set_value(value))
    }

    pub fn set_exception(&mut self, exception: impl Into<Exception>) -> Result<()> {
        let exception = exception.into();
        self.satisfy(|storage| storage.set_exception(exception))
    }

    /// Delivers an error code without allocating.
    pub fn set_error(&mut self, code: ErrorCode) -> Result<()> {
        self.satisfy(|storage| storage.set_error(code))
    }

    /// `Ok` becomes the value, `Err` the exception.
    pub fn set_result<E>(&mut self, result: std::result::Result<R, E>) -> Result<()>
    where
        E: StdError + Send + Sync + 'static,
    {
        match result {
            Ok(value) => self.set_value(value),
            Err(error) => self.set_exception(error),
        }
    }

    /// Moves this producer out, leaving an empty unlinked one behind.
    ///
    /// The consumer follows the returned producer.
    pub fn take(&mut self) -> Producer<R> {
        mem::take(self)
    }

    /// Exchanges two producers along with the consumers they feed.
    pub fn swap(&mut self, other: &mut Producer<R>) {
        mem::swap(&mut self.state, &mut other.state);
    }
}

impl<R> Default for Producer<R> {
    fn default() -> Self {
        Producer::new()
    }
}

impl<R> Drop for Producer<R> {
    /// If still linked and unresolved, leave the consumer a broken promise.
    fn drop(&mut self) {
        let State::Shared(node) = &self.state else {
            return;
        };
        let mut guard = DualLock::producer(node);
        let (own, consumer) = guard.split();
        if let Some(consumer) = consumer {
            if consumer.storage.is_empty() {
                debug!(producer = ?Arc::as_ptr(node), "dropped without a result");
                consumer.storage = Storage::Exception(Exception::new(FutureError::BrokenPromise));
            }
            consumer.producer = None;
        }
        if let Some(own) = own {
            own.reset();
        }
    }
}

impl<R> fmt::Debug for Producer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("shared", &self.is_shared())
            .field("has_consumer", &self.has_consumer())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_until_consumer_is_created() {
        let mut producer = Producer::<u8>::new();
        assert!(!producer.is_shared());
        producer.set_value(1).unwrap();
        assert!(!producer.is_shared());
        assert!(!producer.has_consumer());

        let consumer = producer.get_consumer().unwrap();
        assert!(producer.is_shared());
        assert!(producer.has_consumer());
        assert!(consumer.has_value());
    }

    #[test]
    fn second_consumer_is_refused() {
        let mut producer = Producer::<u8>::new();
        let mut first = producer.get_consumer().unwrap();
        assert_eq!(producer.get_consumer().unwrap_err(), FutureError::AlreadyRetrieved);
        producer.set_value(5).unwrap();
        assert_eq!(first.get().unwrap(), 5);
        assert_eq!(producer.get_consumer().unwrap_err(), FutureError::AlreadyRetrieved);
    }

    #[test]
    fn set_twice_is_refused_on_both_sides_of_linking() {
        let mut producer = Producer::<u8>::new();
        producer.set_error(ErrorCode::new(3).unwrap()).unwrap();
        assert_eq!(producer.set_value(1), Err(FutureError::AlreadySatisfied));
        let mut consumer = producer.get_consumer().unwrap();
        assert_eq!(
            producer.set_exception(FutureError::NoState),
            Err(FutureError::AlreadySatisfied)
        );
        assert_eq!(consumer.get_error().unwrap(), ErrorCode::new(3));
    }

    #[test]
    fn set_result_routes_errors_to_exception() {
        let mut producer = Producer::<u8>::new();
        let consumer = producer.get_consumer().unwrap();
        producer
            .set_result(Err::<u8, _>(std::io::Error::new(std::io::ErrorKind::Other, "nope")))
            .unwrap();
        assert!(consumer.has_exception());
        assert!(!consumer.has_error());
    }

    #[test]
    fn dropping_unlinked_producer_is_quiet() {
        let mut producer = Producer::new();
        producer.set_value(String::from("discarded")).unwrap();
        drop(producer);
    }

    #[test]
    fn unlinks_once_consumer_is_gone() {
        let mut producer = Producer::<u8>::new();
        let consumer = producer.get_consumer().unwrap();
        drop(consumer);
        assert!(!producer.has_consumer());
        assert!(producer.is_shared());
        // nobody is listening any more; the value lands in the producer
        producer.set_value(1).unwrap();
    }

    #[test]
    fn set_after_get_is_refused() {
        let mut producer = Producer::<u8>::new();
        let mut consumer = producer.get_consumer().unwrap();
        producer.set_value(1).unwrap();
        assert_eq!(consumer.get().unwrap(), 1);
        assert!(!producer.has_consumer());
        assert_eq!(producer.set_value(2), Err(FutureError::AlreadySatisfied));
        assert_eq!(
            producer.set_error(ErrorCode::new(1).unwrap()),
            Err(FutureError::AlreadySatisfied)
        );
        assert_eq!(
            producer.set_exception(FutureError::NoState),
            Err(FutureError::AlreadySatisfied)
        );
    }

    #[test]
    fn set_after_get_error_is_refused() {
        let mut producer = Producer::<u8>::new();
        let mut consumer = producer.get_consumer().unwrap();
        producer.set_error(ErrorCode::new(7).unwrap()).unwrap();
        assert_eq!(consumer.get_error().unwrap(), ErrorCode::new(7));
        assert_eq!(producer.set_value(2), Err(FutureError::AlreadySatisfied));
    }

    #[test]
    fn set_after_satisfied_consumer_is_dropped_is_refused() {
        let mut producer = Producer::<u8>::new();
        let consumer = producer.get_consumer().unwrap();
        producer.set_value(1).unwrap();
        drop(consumer);
        assert!(!producer.has_consumer());
        assert_eq!(producer.set_value(2), Err(FutureError::AlreadySatisfied));
    }

    #[test]
    fn take_leaves_an_empty_producer() {
        let mut producer = Producer::<u8>::new();
        producer.set_value(1).unwrap();
        let mut moved = producer.take();
        assert!(!producer.is_shared());
        producer.set_value(2).unwrap();
        let mut consumer = moved.get_consumer().unwrap();
        assert_eq!(consumer.get().unwrap(), 1);
    }

    #[test]
    fn debug_shows_link_state() {
        let mut producer = Producer::<u8>::new();
        assert_eq!(format!("{producer:?}"), "Producer { shared: false, has_consumer: false }");
        let _consumer = producer.get_consumer().unwrap();
        assert_eq!(format!("{producer:?}"), "Producer { shared: true, has_consumer: true }");
    }
}
