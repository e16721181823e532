//! Listener records: the observers attached to contexts.

use std::{
	fmt,
	num::NonZeroU64,
	rc::Rc,
	sync::atomic::{AtomicU64, Ordering},
};

use bitflags::bitflags;

use crate::{
	context::{ContextHandle, Data},
	provider::Provider,
};

bitflags! {
	/// Which of a listener's four callbacks are present. Recomputed whenever
	/// a listener is constructed; never mutated afterwards.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
	pub struct CallbackFlags: u8 {
		const CREATE = 1 << 0;
		const BEFORE = 1 << 1;
		const AFTER = 1 << 2;
		const ERROR = 1 << 3;
	}
}

/// A listener's process-wide, monotonically assigned identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(NonZeroU64);

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

fn next_listener_id() -> ListenerId {
	let n = NEXT_ID.fetch_add(1, Ordering::Relaxed) + 1;
	ListenerId(NonZeroU64::new(n).expect("listener id counter overflowed"))
}

/// Runs on `create`. The second argument is the provider's canonical name
/// (see [`Provider::name`]). Returns the slot value to store, or `None` to
/// fall back to the listener's `initial_data`.
pub type CreateCallback = Box<dyn Fn(Option<&Data>, &str) -> Option<Data>>;
/// Runs on `load`, just before the active context's resource dispatches.
pub type BeforeCallback = Box<dyn Fn(&ContextHandle, Option<&Data>)>;
/// Runs on `unload`, just after the resource's callback returns.
pub type AfterCallback = Box<dyn Fn(&ContextHandle, Option<&Data>)>;
/// Runs on an unhandled exception in the active context. Returns whether it was handled.
pub type ErrorCallback = Box<dyn Fn(&ContextHandle, Option<&Data>, &(dyn std::error::Error + 'static)) -> bool>;

/// Up to four optional callbacks, one per lifecycle phase a listener can
/// observe.
#[derive(Default)]
pub struct Callbacks {
	pub create: Option<CreateCallback>,
	pub before: Option<BeforeCallback>,
	pub after: Option<AfterCallback>,
	pub error: Option<ErrorCallback>,
}

impl Callbacks {
	fn flags(&self) -> CallbackFlags {
		let mut flags = CallbackFlags::empty();
		if self.create.is_some() {
			flags |= CallbackFlags::CREATE;
		}
		if self.before.is_some() {
			flags |= CallbackFlags::BEFORE;
		}
		if self.after.is_some() {
			flags |= CallbackFlags::AFTER;
		}
		if self.error.is_some() {
			flags |= CallbackFlags::ERROR;
		}
		flags
	}
}

impl fmt::Debug for Callbacks {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Callbacks").field("flags", &self.flags()).finish()
	}
}

pub(crate) struct Listener {
	id: ListenerId,
	callbacks: Callbacks,
	flags: CallbackFlags,
	initial_data: Option<Data>,
	watch_mask: Provider,
}

/// Construction options for a new listener.
pub struct ListenerOptions {
	pub callbacks: Callbacks,
	pub initial_data: Option<Data>,
	pub watch_mask: Provider,
}

impl Default for ListenerOptions {
	fn default() -> Self {
		Self {
			callbacks: Callbacks::default(),
			initial_data: None,
			#[cfg(feature = "default_watch_mask_all")]
			watch_mask: crate::provider::DEFAULT_WATCH_MASK,
			#[cfg(not(feature = "default_watch_mask_all"))]
			watch_mask: Provider::NONE,
		}
	}
}

/// An installed observer. Immutable after construction; `Clone` is a cheap
/// refcount bump, not a deep copy.
#[derive(Clone)]
pub struct ListenerHandle(Rc<Listener>);

impl ListenerHandle {
	pub(crate) fn new(options: ListenerOptions) -> Self {
		let flags = options.callbacks.flags();
		Self(Rc::new(Listener {
			id: next_listener_id(),
			callbacks: options.callbacks,
			flags,
			initial_data: options.initial_data,
			watch_mask: options.watch_mask,
		}))
	}

	#[must_use]
	pub fn id(&self) -> ListenerId {
		self.0.id
	}

	#[must_use]
	pub fn flags(&self) -> CallbackFlags {
		self.0.flags
	}

	#[must_use]
	pub fn watch_mask(&self) -> Provider {
		self.0.watch_mask
	}

	#[must_use]
	pub fn initial_data(&self) -> Option<&Data> {
		self.0.initial_data.as_ref()
	}

	pub(crate) fn callbacks(&self) -> &Callbacks {
		&self.0.callbacks
	}
}

impl PartialEq for ListenerHandle {
	fn eq(&self, other: &Self) -> bool {
		self.0.id == other.0.id
	}
}
impl Eq for ListenerHandle {}

impl fmt::Debug for ListenerHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ListenerHandle")
			.field("id", &self.0.id)
			.field("flags", &self.0.flags)
			.field("watch_mask", &self.0.watch_mask)
			.finish()
	}
}

/// Accepted by [`create_listener`]: either fresh construction options, bare
/// callbacks, or an already-constructed handle (returned unchanged, so
/// passing a [`ListenerHandle`] back through is always a no-op).
pub trait IntoListener {
	fn into_listener(self) -> ListenerHandle;
}

impl IntoListener for ListenerOptions {
	fn into_listener(self) -> ListenerHandle {
		ListenerHandle::new(self)
	}
}

impl IntoListener for ListenerHandle {
	fn into_listener(self) -> ListenerHandle {
		self
	}
}

impl IntoListener for Callbacks {
	fn into_listener(self) -> ListenerHandle {
		ListenerHandle::new(ListenerOptions {
			callbacks: self,
			..Default::default()
		})
	}
}

/// Constructs a new [`ListenerHandle`], or returns an already-constructed one
/// unchanged.
#[must_use]
pub fn create_listener(source: impl IntoListener) -> ListenerHandle {
	source.into_listener()
}
