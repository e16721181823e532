//! Contexts: per-async-operation snapshots of the listener set.

use std::{
	any::Any,
	cell::{Cell, Ref, RefCell, RefMut},
	collections::BTreeMap,
	fmt,
	rc::Rc,
};

use crate::{
	listener::{CallbackFlags, ListenerHandle, ListenerId},
	provider::Provider,
};

/// Opaque per-listener payload. Reference-counted so a listener's
/// `initial_data` can be shared, not deep-copied, into every context that
/// falls back to it.
pub type Data = Rc<dyn Any>;

pub(crate) struct Context {
	pub(crate) provider: Provider,
	pub(crate) listeners: Vec<ListenerHandle>,
	pub(crate) slots: BTreeMap<ListenerId, Option<Data>>,
	pub(crate) watched_aggregate: Provider,
	pub(crate) callback_flag_aggregate: CallbackFlags,
	pub(crate) teardown: Option<Box<dyn FnOnce()>>,
	/// Set by `load` while this context is pushed onto the stack, cleared by
	/// whichever of `unload`/`error` pops it back off. A context can cycle
	/// through this more than once (an interval timer's wrapper reuses the
	/// same context every period); a stray `unload` call on a context that
	/// isn't currently pushed (the resource's caller doesn't know `error`
	/// already popped it) is a no-op instead of re-running `after` or
	/// double-popping the stack.
	pub(crate) on_stack: Cell<bool>,
}

impl Context {
	pub(crate) fn new(provider: Provider) -> Self {
		Self {
			provider,
			listeners: Vec::new(),
			slots: BTreeMap::new(),
			watched_aggregate: Provider::NONE,
			callback_flag_aggregate: CallbackFlags::empty(),
			teardown: None,
			on_stack: Cell::new(false),
		}
	}
}

/// A handle to a [`Context`]. Cheaply cloned; every clone
/// refers to the same underlying context, like the active-context and
/// suspended-stack references the Lifecycle Protocol passes around.
#[derive(Clone)]
pub struct ContextHandle(Rc<RefCell<Context>>);

impl ContextHandle {
	pub(crate) fn new(context: Context) -> Self {
		Self(Rc::new(RefCell::new(context)))
	}

	/// A fresh Global Context: empty listener sequence, `Provider::NONE`,
	/// zeroed aggregates (invariant: the stack never runs dry).
	#[must_use]
	pub fn global() -> Self {
		Self::new(Context::new(Provider::NONE))
	}

	/// A context with no attached listeners, for the scheduler's fast path
	/// when the Status Word shows nobody is watching `provider`.
	#[must_use]
	pub fn empty(provider: Provider) -> Self {
		Self::new(Context::new(provider))
	}

	pub(crate) fn borrow(&self) -> Ref<'_, Context> {
		self.0.borrow()
	}

	pub(crate) fn borrow_mut(&self) -> RefMut<'_, Context> {
		self.0.borrow_mut()
	}

	/// Registers a hook run once, the moment `detach` empties this context's
	/// listener sequence. Replaces any previously registered hook.
	pub fn on_listeners_emptied(&self, hook: impl FnOnce() + 'static) {
		self.0.borrow_mut().teardown = Some(Box::new(hook));
	}

	#[must_use]
	pub fn provider(&self) -> Provider {
		self.borrow().provider
	}

	#[must_use]
	pub fn listener_count(&self) -> usize {
		self.borrow().listeners.len()
	}

	#[must_use]
	pub fn watched_aggregate(&self) -> Provider {
		self.borrow().watched_aggregate
	}

	#[must_use]
	pub fn callback_flags(&self) -> CallbackFlags {
		self.borrow().callback_flag_aggregate
	}

	/// Looks up a listener's slot. `None` means the listener isn't attached
	/// to this context at all; `Some(None)` means attached with a null slot;
	/// `Some(Some(_))` is the stored value.
	#[must_use]
	pub fn slot(&self, id: ListenerId) -> Option<Option<Data>> {
		self.borrow().slots.get(&id).cloned()
	}
}

impl PartialEq for ContextHandle {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}
impl Eq for ContextHandle {}

impl fmt::Debug for ContextHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let c = self.borrow();
		f.debug_struct("ContextHandle")
			.field("provider", &c.provider)
			.field("listener_count", &c.listeners.len())
			.finish()
	}
}
