#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]
#![doc = include_str!("../README.md")]
//!
//! # Threading notes
//!
//! Every [`HookRuntime`] is confined to a single thread: its state lives
//! behind plain [`Cell`](core::cell::Cell)s and [`RefCell`](core::cell::RefCell)s,
//! not atomics or locks. Propagating context across threads is out of
//! scope; use a [`GlobalHooks`] (or a `HookRuntime` you own) per thread
//! instead.

pub mod context;
pub mod error;
pub mod listener;
#[cfg(feature = "global_hooks")]
pub mod native;
pub mod provider;
pub mod runtime;
pub mod scheduler;
mod stack;

#[doc(inline)]
pub use context::ContextHandle;
#[doc(inline)]
pub use error::ContractError;
#[doc(inline)]
pub use listener::{create_listener, Callbacks, CallbackFlags, IntoListener, ListenerHandle, ListenerId, ListenerOptions};
#[doc(inline)]
pub use provider::Provider;
#[doc(inline)]
pub use runtime::HookRuntime;
#[cfg(feature = "global_hooks")]
#[doc(inline)]
pub use runtime::{add_listener, remove_listener, GlobalHooks};
#[doc(inline)]
pub use stack::StatusWordSnapshot;

#[doc = include_str!("../README.md")]
mod readme {}
