//! The lifecycle protocol: `create`, `load`, `unload`, `error`.
//!
//! [`HookRuntime`] is the reentrant state machine a native collaborator
//! drives directly. [`GlobalHooks`], gated behind the `global_hooks` feature,
//! is a zero-sized handle onto a thread-confined singleton instance of it, so
//! callers never touch the storage directly.

use std::{
	cell::Cell,
	error::Error,
	panic::{catch_unwind, resume_unwind, AssertUnwindSafe},
};

use crate::{
	context::ContextHandle,
	listener::{CallbackFlags, ListenerHandle},
	provider::Provider,
	stack::{ContextStack, StatusWordSnapshot},
};

/// A single instance of the tracker: one context stack, one reentrancy
/// guard pair. Not `Sync`; confine each instance to one thread (directly, or
/// via [`GlobalHooks`]'s `thread_local!`).
pub struct HookRuntime {
	stack: ContextStack,
	in_async_tick: Cell<bool>,
	in_error_tick: Cell<bool>,
}

impl Default for HookRuntime {
	fn default() -> Self {
		Self::new()
	}
}

impl HookRuntime {
	#[must_use]
	pub fn new() -> Self {
		Self {
			stack: ContextStack::new(),
			in_async_tick: Cell::new(false),
			in_error_tick: Cell::new(false),
		}
	}

	/// The current Status Word snapshot.
	#[must_use]
	pub fn status(&self) -> StatusWordSnapshot {
		self.stack.status()
	}

	/// The number of suspended contexts beneath the active one.
	#[must_use]
	pub fn depth(&self) -> usize {
		self.stack.depth()
	}

	/// The currently active context.
	#[must_use]
	pub fn active(&self) -> ContextHandle {
		self.stack.active()
	}

	/// Builds a new [`ContextHandle`] for `provider`, snapshotting every
	/// listener attached to the active context and running each one's
	/// `create` callback if it's watching `provider`.
	///
	/// # Panics
	///
	/// Panics if the active context's listener sequence is empty: the
	/// native collaborator is expected to have consulted the Status Word
	/// first and skipped this call entirely. A create callback that panics
	/// leaves the reentrancy guard set and propagates the unwind, same as
	/// `load`/`unload`.
	pub fn create(&self, provider: Provider) -> ContextHandle {
		let active = self.stack.active();
		let active_ref = active.borrow();
		assert!(
			!active_ref.listeners.is_empty(),
			"context-hooks: create() called with an empty active listener queue"
		);

		self.in_async_tick.set(true);
		let mut new_ctx = crate::context::Context::new(provider);
		for listener in &active_ref.listeners {
			new_ctx.listeners.push(listener.clone());
			new_ctx.watched_aggregate |= listener.watch_mask();

			let watching = provider.intersects(listener.watch_mask());
			let value = if watching && listener.flags().contains(CallbackFlags::CREATE) {
				let name = provider.name().unwrap_or("UNKNOWN");
				let callback = listener.callbacks().create.as_deref().expect("CREATE flag implies a callback");
				catch_unwind(AssertUnwindSafe(|| callback(listener.initial_data(), name)))
					.unwrap_or_else(|payload| resume_unwind(payload))
			} else {
				None
			};
			new_ctx.slots.insert(listener.id(), value.or_else(|| listener.initial_data().cloned()));
		}
		new_ctx.callback_flag_aggregate = active_ref.callback_flag_aggregate;
		drop(active_ref);
		self.in_async_tick.set(false);

		log::trace!("context-hooks: create provider={provider:?}");
		ContextHandle::new(new_ctx)
	}

	/// Pushes `ctx` onto the context stack and runs every watching
	/// listener's `before` callback, unless `ctx` has no listeners (in which
	/// case the stack isn't touched at all) or none of them watch `before`
	/// for `ctx`'s provider.
	pub fn load(&self, ctx: &ContextHandle) {
		if ctx.listener_count() == 0 {
			return;
		}
		self.stack.push(ctx.clone());
		ctx.borrow().on_stack.set(true);
		log::trace!("context-hooks: load provider={:?} depth={}", ctx.provider(), self.stack.depth());

		let fires_before = {
			let c = ctx.borrow();
			c.provider.intersects(c.watched_aggregate) && c.callback_flag_aggregate.contains(CallbackFlags::BEFORE)
		};
		if !fires_before {
			return;
		}

		self.in_async_tick.set(true);
		let c = ctx.borrow();
		for listener in &c.listeners {
			if c.provider.intersects(listener.watch_mask()) && listener.flags().contains(CallbackFlags::BEFORE) {
				let slot = c.slots.get(&listener.id()).and_then(Option::as_ref);
				let callback = listener.callbacks().before.as_deref().expect("BEFORE flag implies a callback");
				callback(ctx, slot);
			}
		}
		drop(c);
		self.in_async_tick.set(false);
	}

	/// Runs every watching listener's `after` callback, then pops `ctx` off
	/// the context stack.
	///
	/// A no-op if `ctx` isn't currently pushed (already popped by a prior
	/// `unload`, or by `error` returning handled): the resource driving this
	/// call may not know its tick already errored out.
	pub fn unload(&self, ctx: &ContextHandle) {
		if !ctx.borrow().on_stack.get() {
			return;
		}

		let fires_after = {
			let c = ctx.borrow();
			c.provider.intersects(c.watched_aggregate) && c.callback_flag_aggregate.contains(CallbackFlags::AFTER)
		};

		if fires_after {
			self.in_async_tick.set(true);
			let c = ctx.borrow();
			for listener in &c.listeners {
				if c.provider.intersects(listener.watch_mask()) && listener.flags().contains(CallbackFlags::AFTER) {
					let slot = c.slots.get(&listener.id()).and_then(Option::as_ref);
					let callback = listener.callbacks().after.as_deref().expect("AFTER flag implies a callback");
					callback(ctx, slot);
				}
			}
			drop(c);
			self.in_async_tick.set(false);
		}

		ctx.borrow().on_stack.set(false);
		self.stack.pop();
		log::trace!("context-hooks: unload depth={}", self.stack.depth());
	}

	/// Offers `err` to the active context's `error` listeners, in
	/// attachment order (none of them stop the rest — every listener sees
	/// it). Returns whether at least one returned `true` and no nested async
	/// tick is in progress. Always pops the active context, matching
	/// `unload`.
	///
	/// # Re-entrancy
	///
	/// Returns `false` immediately, without popping anything, if already
	/// inside an error dispatch (`in_error_tick`): nested fatal exceptions
	/// during error handling are not this crate's concern.
	///
	/// If an `error` callback itself panics, the process terminates: an
	/// exception escaping exception handling has no well-defined recovery.
	pub fn error(&self, err: &(dyn Error + 'static)) -> bool {
		if self.in_error_tick.get() {
			return false;
		}

		let active = self.stack.active();
		let should_dispatch = active.borrow().callback_flag_aggregate.contains(CallbackFlags::ERROR);
		if !should_dispatch {
			return false;
		}

		self.in_error_tick.set(true);
		let mut handled = false;
		{
			let c = active.borrow();
			for listener in &c.listeners {
				if !listener.flags().contains(CallbackFlags::ERROR) {
					continue;
				}
				let slot = c.slots.get(&listener.id()).and_then(Option::as_ref);
				let callback = listener.callbacks().error.as_deref().expect("ERROR flag implies a callback");
				match catch_unwind(AssertUnwindSafe(|| callback(&active, slot, err))) {
					Ok(true) => handled = true,
					Ok(false) => {}
					Err(_payload) => {
						log::error!("context-hooks: an error listener panicked while handling an error; aborting");
						std::process::exit(1);
					}
				}
			}
		}
		self.in_error_tick.set(false);

		let still_mid_tick = self.in_async_tick.get();
		active.borrow().on_stack.set(false);
		self.stack.pop();
		handled && !still_mid_tick
	}

	/// Attaches `listener` to the active context, unless it's already
	/// attached there (idempotent).
	pub fn attach(&self, listener: ListenerHandle) {
		{
			let active = self.stack.active();
			let mut c = active.borrow_mut();
			if c.slots.contains_key(&listener.id()) {
				return;
			}
			c.callback_flag_aggregate |= listener.flags();
			c.watched_aggregate |= listener.watch_mask();
			c.slots.insert(listener.id(), listener.initial_data().cloned());
			c.listeners.push(listener);
		}
		self.stack.refresh_status();
	}

	/// Detaches `listener` from every context currently on the stack (active
	/// and suspended), recomputing each affected context's aggregates. Runs
	/// a context's `on_listeners_emptied` hook, if any, the moment its
	/// listener sequence becomes empty.
	pub fn detach(&self, listener: &ListenerHandle) {
		for ctx in self.stack.all_contexts() {
			let teardown = {
				let mut c = ctx.borrow_mut();
				if c.slots.remove(&listener.id()).is_none() {
					continue;
				}
				c.listeners.retain(|l| l.id() != listener.id());

				c.watched_aggregate = Provider::NONE;
				c.callback_flag_aggregate = CallbackFlags::empty();
				for l in &c.listeners {
					c.watched_aggregate |= l.watch_mask();
					c.callback_flag_aggregate |= l.flags();
				}

				if c.listeners.is_empty() {
					c.teardown.take()
				} else {
					None
				}
			};
			if let Some(teardown) = teardown {
				teardown();
			}
		}
		self.stack.refresh_status();
	}
}

#[cfg(feature = "global_hooks")]
thread_local! {
	static RUNTIME: HookRuntime = HookRuntime::new();
}

/// The process-wide tracker, confined to whichever thread first touches it
/// (each thread that does gets its own independent instance via
/// `thread_local!`, which is also how this crate supports more than one
/// logically separate tracker without exposing any cross-thread state).
#[cfg(feature = "global_hooks")]
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalHooks;

#[cfg(feature = "global_hooks")]
impl GlobalHooks {
	#[must_use]
	pub fn create(self, provider: Provider) -> ContextHandle {
		RUNTIME.with(|rt| rt.create(provider))
	}

	pub fn load(self, ctx: &ContextHandle) {
		RUNTIME.with(|rt| rt.load(ctx));
	}

	pub fn unload(self, ctx: &ContextHandle) {
		RUNTIME.with(|rt| rt.unload(ctx));
	}

	pub fn error(self, err: &(dyn Error + 'static)) -> bool {
		RUNTIME.with(|rt| rt.error(err))
	}

	pub fn attach(self, listener: ListenerHandle) {
		RUNTIME.with(|rt| rt.attach(listener));
	}

	pub fn detach(self, listener: &ListenerHandle) {
		RUNTIME.with(|rt| rt.detach(listener));
	}

	#[must_use]
	pub fn status(self) -> StatusWordSnapshot {
		RUNTIME.with(HookRuntime::status)
	}

	#[must_use]
	pub fn depth(self) -> usize {
		RUNTIME.with(HookRuntime::depth)
	}

	#[must_use]
	pub fn active(self) -> ContextHandle {
		RUNTIME.with(HookRuntime::active)
	}
}

/// Constructs a listener (or passes one through unchanged) and attaches it to
/// the currently active context of the global tracker.
#[cfg(feature = "global_hooks")]
pub fn add_listener(source: impl crate::listener::IntoListener) -> ListenerHandle {
	let listener = crate::listener::create_listener(source);
	GlobalHooks.attach(listener.clone());
	listener
}

/// Detaches `listener` from every context on the global tracker's stack.
#[cfg(feature = "global_hooks")]
pub fn remove_listener(listener: &ListenerHandle) {
	GlobalHooks.detach(listener);
}
