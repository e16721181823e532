//! Invariants, laws and boundary behaviors of the lifecycle protocol.

use std::rc::Rc;

use context_hooks::{
	create_listener,
	listener::{Callbacks, ListenerOptions},
	provider::Provider,
	runtime::HookRuntime,
};

fn listener_with_mask(mask: Provider) -> context_hooks::ListenerHandle {
	create_listener(ListenerOptions {
		callbacks: Callbacks::default(),
		initial_data: None,
		watch_mask: mask,
	})
}

#[test]
fn slot_presence_matches_listener_membership() {
	let rt = HookRuntime::new();
	let l = listener_with_mask(Provider::TCP);
	rt.attach(l.clone());

	let ctx = rt.create(Provider::TCP);
	assert!(ctx.slot(l.id()).is_some());

	let other = listener_with_mask(Provider::FS);
	assert!(ctx.slot(other.id()).is_none());
}

#[test]
fn watched_aggregate_is_the_union_of_attached_masks() {
	let rt = HookRuntime::new();
	rt.attach(listener_with_mask(Provider::TCP));
	rt.attach(listener_with_mask(Provider::FS));

	let ctx = rt.create(Provider::TCP);
	assert_eq!(ctx.watched_aggregate(), Provider::TCP | Provider::FS);
}

#[test]
fn listener_ids_are_unique_and_increasing() {
	let a = listener_with_mask(Provider::TCP);
	let b = listener_with_mask(Provider::TCP);
	assert!(a.id() != b.id());
	assert!(format!("{a:?}") != format!("{b:?}"));
}

#[test]
fn detach_from_active_removes_listener_everywhere_on_stack() {
	let rt = HookRuntime::new();
	let l = listener_with_mask(Provider::all());
	rt.attach(l.clone());

	let ctx = rt.create(Provider::TCP);
	rt.load(&ctx);
	rt.detach(&l);

	assert!(rt.active().slot(l.id()).is_none());
}

#[test]
fn load_then_unload_restores_depth_and_status() {
	let rt = HookRuntime::new();
	rt.attach(listener_with_mask(Provider::TCP));
	let before = rt.status();

	let ctx = rt.create(Provider::TCP);
	rt.load(&ctx);
	rt.unload(&ctx);

	assert_eq!(rt.depth(), 0);
	assert_eq!(rt.status(), before);
}

#[test]
fn create_listener_is_idempotent_on_an_existing_record() {
	let l = listener_with_mask(Provider::TCP);
	let same = create_listener(l.clone());
	assert_eq!(l, same);
}

#[test]
fn load_with_no_listeners_does_not_push() {
	let rt = HookRuntime::new();
	let ctx = context_hooks::ContextHandle::empty(Provider::TCP);
	rt.load(&ctx);
	assert_eq!(rt.depth(), 0);
}

#[test]
fn unload_still_pops_with_no_after_callbacks() {
	let rt = HookRuntime::new();
	let l = listener_with_mask(Provider::TCP);
	rt.attach(l);

	let ctx = rt.create(Provider::TCP);
	rt.load(&ctx);
	assert_eq!(rt.depth(), 1);
	rt.unload(&ctx);
	assert_eq!(rt.depth(), 0);
}

#[test]
fn error_without_a_listener_returns_false() {
	let rt = HookRuntime::new();
	let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
	assert!(!rt.error(&err));
}

#[test]
fn error_suppresses_after() {
	let rt = HookRuntime::new();
	let after_ran = Rc::new(std::cell::Cell::new(false));
	let flag = after_ran.clone();
	let l = create_listener(ListenerOptions {
		callbacks: Callbacks {
			after: Some(Box::new(move |_ctx, _data| flag.set(true))),
			error: Some(Box::new(|_ctx, _data, _err| true)),
			..Default::default()
		},
		initial_data: None,
		watch_mask: Provider::TCP,
	});
	rt.attach(l);

	let ctx = rt.create(Provider::TCP);
	rt.load(&ctx);

	let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
	assert!(rt.error(&err));
	assert_eq!(rt.depth(), 0);

	// `error` already popped and unwound the context; a caller that still
	// calls `unload` on it (the resource didn't know the tick errored out)
	// must not re-run `after`.
	rt.unload(&ctx);
	assert!(!after_ran.get());
}

#[test]
fn error_only_listener_survives_provider_mismatch_in_create() {
	let rt = HookRuntime::new();
	let l = create_listener(ListenerOptions {
		callbacks: Callbacks {
			error: Some(Box::new(|_ctx, _data, _err| true)),
			..Default::default()
		},
		initial_data: None,
		watch_mask: Provider::FS,
	});
	rt.attach(l);

	// TCP doesn't intersect the listener's FS watch mask, so its CREATE
	// callback (it has none) is skipped, but the ERROR bit still propagates
	// into the child context's callback_flag_aggregate.
	let ctx = rt.create(Provider::TCP);
	let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
	rt.load(&ctx);
	assert!(rt.error(&err));
}
