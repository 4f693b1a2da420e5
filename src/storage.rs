use std::mem;
use std::sync::Arc;

use crate::error::{FutureError, Result};
use crate::exception::{ErrorCode, Exception};
use crate::node::ConsumerNode;

/// Result slot owned by each side of a pair.
///
/// Not thread-safe by itself: shared slots are only touched under the lock
/// of the node that owns them.
pub(crate) enum Storage<R> {
    Empty,
    Value(R),
    Exception(Exception),
    Error(ErrorCode),
    /// Producer side only: the result lives in this consumer.
    Linked(Arc<ConsumerNode<R>>),
    /// Producer side only: the consumer took or kept a result, so no further
    /// result may be set.
    Spent,
}

/// Discriminant of [`Storage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tag {
    Empty,
    Value,
    Exception,
    Error,
    Linked,
    Spent,
}

impl<R> Default for Storage<R> {
    fn default() -> Self {
        Storage::Empty
    }
}

impl<R> Storage<R> {
    pub(crate) fn tag(&self) -> Tag {
        match self {
            Storage::Empty => Tag::Empty,
            Storage::Value(_) => Tag::Value,
            Storage::Exception(_) => Tag::Exception,
            Storage::Error(_) => Tag::Error,
            Storage::Linked(_) => Tag::Linked,
            Storage::Spent => Tag::Spent,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        matches!(self, Storage::Empty)
    }

    pub(crate) fn linked(&self) -> Option<&Arc<ConsumerNode<R>>> {
        match self {
            Storage::Linked(consumer) => Some(consumer),
            _ => None,
        }
    }

    fn satisfy(&mut self, with: Storage<R>) -> Result<()> {
        if !self.is_empty() {
            return Err(FutureError::AlreadySatisfied);
        }
        *self = with;
        Ok(())
    }

    pub(crate) fn set_value(&mut self, value: R) -> Result<()> {
        self.satisfy(Storage::Value(value))
    }

    pub(crate) fn set_exception(&mut self, exception: Exception) -> Result<()> {
        self.satisfy(Storage::Exception(exception))
    }

    pub(crate) fn set_error(&mut self, code: ErrorCode) -> Result<()> {
        self.satisfy(Storage::Error(code))
    }

    pub(crate) fn reset(&mut self) {
        *self = Storage::Empty;
    }

    pub(crate) fn take(&mut self) -> Storage<R> {
        mem::take(self)
    }
}
