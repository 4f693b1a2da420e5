//! The two kinds of failure a producer can deliver in place of a value.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::num::NonZeroI32;
use std::sync::Arc;

use thiserror::Error;

/// An OS-style error code.
///
/// Zero means "no error" and is not representable, so the absence of an
/// error is spelled `Option::<ErrorCode>::None` at no extra size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(NonZeroI32);

impl ErrorCode {
    /// Returns `None` for zero.
    pub const fn new(code: i32) -> Option<Self> {
        match NonZeroI32::new(code) {
            Some(code) => Some(Self(code)),
            None => None,
        }
    }

    /// The calling thread's last OS error, if there is one.
    pub fn last_os_error() -> Option<Self> {
        io::Error::last_os_error().raw_os_error().and_then(Self::new)
    }

    pub fn value(self) -> i32 {
        self.0.get()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&io::Error::from_raw_os_error(self.value()), f)
    }
}

impl StdError for ErrorCode {}

impl From<ErrorCode> for io::Error {
    fn from(code: ErrorCode) -> Self {
        io::Error::from_raw_os_error(code.value())
    }
}

/// A shared, type-erased error handle.
///
/// Cloning is a reference count bump. Like `anyhow::Error`, it deliberately
/// does not implement [`std::error::Error`] itself, so that every error type
/// can convert into it with `?` or `.into()`.
#[derive(Clone)]
pub struct Exception(Arc<dyn StdError + Send + Sync + 'static>);

impl Exception {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Exception(Arc::new(error))
    }

    /// Captures a payload returned by [`std::panic::catch_unwind`].
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_owned(),
                Err(_) => "opaque panic payload".to_owned(),
            },
        };
        Exception::new(Panicked { message })
    }

    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.0.is::<E>()
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// Borrows the underlying error.
    pub fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.0
    }
}

impl<E> From<E> for Exception
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Exception::new(error)
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

/// A panic captured by [`Exception::from_panic`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("panicked: {message}")]
pub struct Panicked {
    pub message: String,
}
