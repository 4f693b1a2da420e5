//! Heap nodes holding the lock and storage of a linked side.
//!
//! A producer only gets a node once it hands out its consumer; a consumer
//! has one from birth. Nodes never move, so the two sides can point at each
//! other while their handles are moved around freely.

use std::sync::Arc;
use std::task::Waker;
use std::thread::Thread;

use parking_lot::Mutex;

use crate::storage::{Storage, Tag};

pub(crate) type ProducerNode<R> = Mutex<Storage<R>>;

pub(crate) type ConsumerNode<R> = Mutex<ConsumerState<R>>;

pub(crate) struct ConsumerState<R> {
    pub(crate) storage: Storage<R>,
    pub(crate) producer: Option<Arc<ProducerNode<R>>>,
    pub(crate) waiter: Waiter,
}

impl<R> ConsumerState<R> {
    pub(crate) fn new(storage: Storage<R>, producer: Arc<ProducerNode<R>>) -> Self {
        ConsumerState {
            storage,
            producer: Some(producer),
            waiter: Waiter::Idle,
        }
    }

    pub(crate) fn status(&self) -> Status {
        Status {
            tag: self.storage.tag(),
            linked: self.producer.is_some(),
        }
    }
}

/// Snapshot of a consumer: what it holds and whether it is still linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Status {
    tag: Tag,
    linked: bool,
}

impl Status {
    pub(crate) fn tag(self) -> Tag {
        self.tag
    }

    pub(crate) fn is_linked(self) -> bool {
        self.linked
    }

    pub(crate) fn is_ready(self) -> bool {
        self.tag != Tag::Empty
    }

    /// Linked to a producer, or holding a result nobody took yet.
    pub(crate) fn is_valid(self) -> bool {
        self.is_linked() || self.is_ready()
    }
}

/// Who to notify once the consumer's storage is filled.
#[derive(Debug, Default)]
pub(crate) enum Waiter {
    #[default]
    Idle,
    Thread(Thread),
    Task(Waker),
}

impl Waiter {
    pub(crate) fn wake(self) {
        match self {
            Waiter::Idle => {}
            Waiter::Thread(thread) => thread.unpark(),
            Waiter::Task(waker) => waker.wake(),
        }
    }
}
