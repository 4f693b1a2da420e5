//! A single-value producer/consumer pair.
//!
//! A [`Producer`] starts out purely local: setting a result before anyone
//! asked for it costs no allocation and no locking. Calling
//! [`Producer::get_consumer`] links the two sides; from then on each side
//! owns a small lock, and every operation locks its own side first and then
//! try-locks the partner, backing off completely when that fails.
//!
//! Linking allocates two small reference-counted nodes, one per side. Only a
//! producer that never hands out a consumer stays allocation-free and
//! lock-free.
//!
//! Once the consumer has taken its result the producer is spent: every
//! further `set_*` call fails with [`FutureError::AlreadySatisfied`].
//!
//! The result is one of a value, an [`ErrorCode`] or an [`Exception`].
//! Protocol misuse is reported separately as a [`FutureError`].
//!
//! # Examples
//!
//! ```
//! use promise_link::{pair, GetError};
//! use std::thread;
//!
//! let (producer, mut consumer) = pair::<u32>();
//! let task = thread::spawn(move || {
//!     // dropped without a result
//!     drop(producer);
//! });
//! task.join().expect("The producer thread has panicked");
//! let err = consumer.get().unwrap_err();
//! assert!(err.is_broken_promise());
//! ```

mod consumer;
mod error;
mod exception;
mod lock;
mod node;
mod producer;
mod storage;

pub use consumer::{Consumer, SPIN_LIMIT};
pub use error::{FutureError, GetError, Result};
pub use exception::{ErrorCode, Exception, Panicked};
pub use producer::Producer;

/// Creates a linked producer/consumer pair.
pub fn pair<R>() -> (Producer<R>, Consumer<R>) {
    Producer::with_consumer()
}
