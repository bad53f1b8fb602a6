//! Event handler registry
//!
//! Maps event names to handlers. A handler is stored together with its
//! declared [`HandlerShape`]; the shape is checked once when the handler is
//! registered, and the decode step for its argument type is bound into the
//! handler at construction time, so dispatch never inspects types.
//!
//! # Example
//! ```ignore
//! #[derive(Deserialize)]
//! struct Message { text: String }
//!
//! let registry = EventRegistry::<Connection>::new();
//! registry.register("chat", EventHandler::with_args(|conn, (msg,): (Message,)| {
//!     println!("chat: {}", msg.text);
//! }))?;
//! registry.register(CONNECT_EVENT, EventHandler::new(|_conn| println!("connected")))?;
//! ```

use crate::error::{Result, SocketIoError};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Pseudo-event fired when the server confirms the session
pub const CONNECT_EVENT: &str = "connect";

/// Pseudo-event fired once when the connection closes
pub const DISCONNECT_EVENT: &str = "disconnect";

/// Declared calling convention of a handler
///
/// `arguments` counts the event arguments the handler binds (the connection
/// context is not counted); `returns` counts its return values. Handlers may
/// bind at most one argument and return at most one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerShape {
    pub arguments: usize,
    pub returns: usize,
}

impl HandlerShape {
    pub const NO_ARGS: HandlerShape = HandlerShape::new(0, 0);
    pub const ONE_ARG: HandlerShape = HandlerShape::new(1, 0);
    pub const ONE_ARG_FALLIBLE: HandlerShape = HandlerShape::new(1, 1);

    pub const fn new(arguments: usize, returns: usize) -> Self {
        Self { arguments, returns }
    }

    #[inline]
    pub fn takes_args(&self) -> bool {
        self.arguments == 1
    }

    /// Reject shapes the registry cannot call
    pub fn validate(&self) -> Result<()> {
        if self.arguments > 1 {
            return Err(SocketIoError::HandlerShape(format!(
                "handler must take zero or one argument, declares {}",
                self.arguments
            )));
        }
        if self.returns > 1 {
            return Err(SocketIoError::HandlerShape(format!(
                "handler must return at most one value, declares {}",
                self.returns
            )));
        }
        Ok(())
    }
}

type InvokeFn<C> = dyn Fn(&C, &str) -> Result<()> + Send + Sync;

/// A callable registered for one event name
///
/// `C` is the context handed to every invocation (the live connection in
/// production, anything convenient in tests).
pub struct EventHandler<C> {
    shape: HandlerShape,
    invoke: Box<InvokeFn<C>>,
}

impl<C: 'static> EventHandler<C> {
    /// Handler that ignores the event's arguments
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&C) + Send + Sync + 'static,
    {
        Self {
            shape: HandlerShape::NO_ARGS,
            invoke: Box::new(move |ctx, _args| {
                f(ctx);
                Ok(())
            }),
        }
    }

    /// Handler binding the event's argument list to `T`
    ///
    /// The argument list is a JSON array, so `T` is typically a tuple
    /// (`(Message,)`), a `Vec`, or `serde_json::Value`.
    pub fn with_args<T, F>(f: F) -> Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(&C, T) + Send + Sync + 'static,
    {
        Self {
            shape: HandlerShape::ONE_ARG,
            invoke: Box::new(move |ctx, args| {
                let value = bind_args::<T>(args)?;
                f(ctx, value);
                Ok(())
            }),
        }
    }

    /// Like [`with_args`](Self::with_args) for handlers that report failure
    pub fn try_with_args<T, F>(f: F) -> Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(&C, T) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            shape: HandlerShape::ONE_ARG_FALLIBLE,
            invoke: Box::new(move |ctx, args| {
                let value = bind_args::<T>(args)?;
                f(ctx, value)
            }),
        }
    }

    /// Handler with an explicitly declared shape and raw argument access
    ///
    /// The shape is not checked here; registration rejects invalid shapes.
    pub fn from_shape<F>(shape: HandlerShape, f: F) -> Self
    where
        F: Fn(&C, &str) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            shape,
            invoke: Box::new(f),
        }
    }

    #[inline]
    pub fn shape(&self) -> HandlerShape {
        self.shape
    }

    /// Invoke with the raw argument list
    pub fn call(&self, ctx: &C, args: &str) -> Result<()> {
        (self.invoke)(ctx, args)
    }
}

impl<C> fmt::Debug for EventHandler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

fn bind_args<T: DeserializeOwned>(args: &str) -> Result<T> {
    serde_json::from_str(args).map_err(|e| SocketIoError::Deserialize(e.to_string()))
}

/// Outcome of a dispatch that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A handler was found and ran
    Invoked,
    /// No handler is registered for the event
    NoHandler,
}

/// Event name → handler table
///
/// Safe to share between connections and to mutate while dispatching.
/// Handlers run outside the table lock, so a handler may register or
/// replace handlers itself.
pub struct EventRegistry<C> {
    handlers: RwLock<HashMap<String, Arc<EventHandler<C>>>>,
}

impl<C: 'static> EventRegistry<C> {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register `handler` for `event`, replacing any previous handler
    pub fn register(&self, event: impl Into<String>, handler: EventHandler<C>) -> Result<()> {
        handler.shape().validate()?;
        self.handlers
            .write()
            .insert(event.into(), Arc::new(handler));
        Ok(())
    }

    /// Remove the handler for `event`; returns whether one existed
    pub fn unregister(&self, event: &str) -> bool {
        self.handlers.write().remove(event).is_some()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.handlers.read().contains_key(event)
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Route one event to its handler
    ///
    /// Unknown events are not an error. A handler whose arguments fail to
    /// bind is not invoked and the bind error is returned.
    pub fn dispatch(&self, ctx: &C, event: &str, args: &str) -> Result<Dispatch> {
        let handler = match self.handlers.read().get(event) {
            Some(handler) => Arc::clone(handler),
            None => return Ok(Dispatch::NoHandler),
        };

        handler.call(ctx, args)?;
        Ok(Dispatch::Invoked)
    }
}

impl<C: 'static> Default for EventRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}
