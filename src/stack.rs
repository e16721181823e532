//! The context stack and its Status Word mirror.

use std::cell::{Cell, RefCell};

use crate::{context::ContextHandle, provider::Provider};

/// A read-only snapshot of the three-slot Status Word: the active context's
/// provider, listener-sequence length, and watched-provider aggregate. A
/// native collaborator consults this before deciding whether `create`/`load`
/// is worth calling at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusWordSnapshot {
	pub active_provider: Provider,
	pub active_queue_length: u32,
	pub active_watched_aggregate: Provider,
}

#[derive(Default)]
struct StatusWord {
	provider: Cell<u32>,
	queue_length: Cell<u32>,
	watched_aggregate: Cell<u32>,
}

impl StatusWord {
	fn write(&self, ctx: &ContextHandle) {
		self.provider.set(ctx.provider().bits());
		self.queue_length.set(ctx.listener_count() as u32);
		self.watched_aggregate.set(ctx.watched_aggregate().bits());
	}

	fn snapshot(&self) -> StatusWordSnapshot {
		StatusWordSnapshot {
			active_provider: Provider::from_bits_retain(self.provider.get()),
			active_queue_length: self.queue_length.get(),
			active_watched_aggregate: Provider::from_bits_retain(self.watched_aggregate.get()),
		}
	}
}

/// The LIFO of suspended contexts plus the distinguished active-context cell.
/// The active context is not the stack top; it's a separate slot the stack
/// swaps on `push`/`pop`.
pub(crate) struct ContextStack {
	active: RefCell<ContextHandle>,
	suspended: RefCell<Vec<ContextHandle>>,
	status: StatusWord,
}

impl ContextStack {
	pub(crate) fn new() -> Self {
		let global = ContextHandle::global();
		let status = StatusWord::default();
		status.write(&global);
		Self {
			active: RefCell::new(global),
			suspended: RefCell::new(Vec::new()),
			status,
		}
	}

	pub(crate) fn active(&self) -> ContextHandle {
		self.active.borrow().clone()
	}

	/// Suspends the current active context and makes `ctx` active.
	pub(crate) fn push(&self, ctx: ContextHandle) {
		let previous = self.active.replace(ctx);
		self.suspended.borrow_mut().push(previous);
		self.status.write(&self.active.borrow());
	}

	/// Restores the most recently suspended context, or a fresh Global
	/// Context if the stack is empty (the previous one is discarded, not
	/// reused: invariant "the stack never runs dry").
	pub(crate) fn pop(&self) {
		let next = self.suspended.borrow_mut().pop().unwrap_or_else(ContextHandle::global);
		*self.active.borrow_mut() = next;
		self.status.write(&self.active.borrow());
	}

	pub(crate) fn refresh_status(&self) {
		self.status.write(&self.active.borrow());
	}

	pub(crate) fn status(&self) -> StatusWordSnapshot {
		self.status.snapshot()
	}

	/// The active context followed by every suspended one, for operations
	/// (like `detach`) that must visit the whole stack regardless of depth.
	pub(crate) fn all_contexts(&self) -> Vec<ContextHandle> {
		let mut all = vec![self.active()];
		all.extend(self.suspended.borrow().iter().cloned());
		all
	}

	pub(crate) fn depth(&self) -> usize {
		self.suspended.borrow().len()
	}
}
