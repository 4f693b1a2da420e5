//! Locking a side together with its linked partner.
//!
//! There is no global lock order. Whoever calls locks its own node first and
//! only ever `try_lock`s the partner; if that fails it lets go of everything
//! and starts over, so two sides racing from opposite ends cannot deadlock.

use std::hint;
use std::mem;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{MutexGuard, RawMutex};

use crate::node::{ConsumerNode, ConsumerState, ProducerNode, Waiter};
use crate::storage::Storage;

type PartnerGuard<T> = ArcMutexGuard<RawMutex, T>;

/// Field order is unlock order: the partner goes before the primary.
enum Held<'a, R> {
    Producer {
        consumer: Option<PartnerGuard<ConsumerState<R>>>,
        own: MutexGuard<'a, Storage<R>>,
    },
    Consumer {
        producer: Option<PartnerGuard<Storage<R>>>,
        own: MutexGuard<'a, ConsumerState<R>>,
    },
}

/// Scope guard over one or both nodes of a pair.
pub(crate) struct DualLock<'a, R> {
    held: Option<Held<'a, R>>,
}

impl<'a, R> DualLock<'a, R> {
    pub(crate) fn producer(node: &'a ProducerNode<R>) -> Self {
        loop {
            let own = node.lock();
            let partner = own.linked().map(|consumer| consumer.try_lock_arc());
            match partner {
                None => return Self::hold(Held::Producer { consumer: None, own }),
                Some(Some(consumer)) => {
                    return Self::hold(Held::Producer {
                        consumer: Some(consumer),
                        own,
                    })
                }
                Some(None) => drop(own),
            }
            hint::spin_loop();
        }
    }

    pub(crate) fn consumer(node: &'a ConsumerNode<R>) -> Self {
        loop {
            let own = node.lock();
            let partner = own.producer.as_ref().map(|producer| producer.try_lock_arc());
            match partner {
                None => return Self::hold(Held::Consumer { producer: None, own }),
                Some(Some(producer)) => {
                    return Self::hold(Held::Consumer {
                        producer: Some(producer),
                        own,
                    })
                }
                Some(None) => drop(own),
            }
            hint::spin_loop();
        }
    }

    fn hold(held: Held<'a, R>) -> Self {
        DualLock { held: Some(held) }
    }

    /// Both halves at once; each is `None` when that node isn't held.
    pub(crate) fn split(&mut self) -> (Option<&mut Storage<R>>, Option<&mut ConsumerState<R>>) {
        match &mut self.held {
            Some(Held::Producer { consumer, own }) => (Some(&mut **own), consumer.as_deref_mut()),
            Some(Held::Consumer { producer, own }) => (producer.as_deref_mut(), Some(&mut **own)),
            None => (None, None),
        }
    }

    pub(crate) fn producer_storage(&mut self) -> Option<&mut Storage<R>> {
        self.split().0
    }

    pub(crate) fn consumer_state(&mut self) -> Option<&mut ConsumerState<R>> {
        self.split().1
    }

    /// Where the result lives: the consumer's storage once linked, the
    /// producer's otherwise.
    pub(crate) fn authoritative(&mut self) -> Option<&mut Storage<R>> {
        match self.split() {
            (_, Some(consumer)) => Some(&mut consumer.storage),
            (producer, None) => producer,
        }
    }
}

impl<R> Drop for DualLock<'_, R> {
    /// Unlocks, then wakes whoever waits on a consumer that now has a result.
    fn drop(&mut self) {
        let waiter = match self.consumer_state() {
            Some(state) if !state.storage.is_empty() => mem::take(&mut state.waiter),
            _ => Waiter::Idle,
        };
        drop(self.held.take());
        waiter.wake();
    }
}
