//! Native-collaborator entry points.
//!
//! A real embedding wires these functions — plus [`status_word`] — into the
//! points in its own reactor where it constructs, dispatches, tears down and
//! fails an asynchronous resource. This module does not implement a reactor
//! itself; [`crate::scheduler`] is the in-process stand-in used for testing.

use std::error::Error;

use crate::{context::ContextHandle, provider::Provider, runtime::GlobalHooks, stack::StatusWordSnapshot};

/// Call from a native resource constructor, right before it hands a fresh
/// asynchronous operation off to the reactor.
#[must_use]
pub fn run_async_queue(provider: Provider) -> ContextHandle {
	GlobalHooks.create(provider)
}

/// Call immediately before a native resource dispatches its user callback.
pub fn load_async_queue(ctx: &ContextHandle) {
	GlobalHooks.load(ctx);
}

/// Call immediately after a native resource's user callback returns.
pub fn unload_async_queue(ctx: &ContextHandle) {
	GlobalHooks.unload(ctx);
}

/// Call from the fatal-exception path. Returns whether some listener handled it.
pub fn error_handler(err: &(dyn Error + 'static)) -> bool {
	GlobalHooks.error(err)
}

/// Read-only access to the Status Word, so a native collaborator can skip
/// `create`/`load` when nobody is listening.
#[must_use]
pub fn status_word() -> StatusWordSnapshot {
	GlobalHooks.status()
}
