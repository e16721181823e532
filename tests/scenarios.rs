//! End-to-end exercises of the lifecycle protocol through a listener's eyes.

#[path = "_validator.rs"]
mod validator;

use std::{cell::Cell, rc::Rc};

use context_hooks::{
	context::Data,
	create_listener,
	listener::{Callbacks, ListenerOptions},
	provider::Provider,
	runtime::HookRuntime,
	scheduler::Scheduler,
};
use validator::Validator;

#[test]
fn create_before_after_fire_in_order_with_shared_data() {
	let _ = env_logger::builder().is_test(true).try_init();

	let rt = HookRuntime::new();
	let global = rt.active();
	let log = Rc::new(Validator::<i32>::new());
	let log_before = log.clone();
	let log_after = log.clone();

	let listener = create_listener(ListenerOptions {
		callbacks: Callbacks {
			create: Some(Box::new(|_initial, _name| Some(Rc::new('A') as Data))),
			before: Some(Box::new(move |_ctx, data| {
				assert_eq!(data.and_then(|d| d.downcast_ref::<char>()).copied(), Some('A'));
				log_before.push(2);
			})),
			after: Some(Box::new(move |_ctx, data| {
				assert_eq!(data.and_then(|d| d.downcast_ref::<char>()).copied(), Some('A'));
				log_after.push(3);
			})),
			error: None,
		},
		initial_data: Some(Rc::new(1i32) as Data),
		watch_mask: Provider::TCP,
	});
	rt.attach(listener.clone());

	let ctx = rt.create(Provider::TCP);
	let stored = ctx.slot(listener.id()).flatten();
	assert_eq!(stored.and_then(|d| d.downcast_ref::<char>().copied()), Some('A'));

	rt.load(&ctx);
	rt.unload(&ctx);

	log.expect([2, 3]);
	assert_eq!(rt.depth(), 0);
	assert_eq!(rt.active(), global);
}

#[test]
fn non_watching_listener_gets_no_callbacks_but_keeps_its_slot() {
	let rt = HookRuntime::new();
	let create_called = Rc::new(Cell::new(false));
	let before_called = Rc::new(Cell::new(false));
	let after_called = Rc::new(Cell::new(false));
	let (c1, b1, a1) = (create_called.clone(), before_called.clone(), after_called.clone());

	let initial: Data = Rc::new(42i32);
	let listener = create_listener(ListenerOptions {
		callbacks: Callbacks {
			create: Some(Box::new(move |_i, _name| {
				c1.set(true);
				None
			})),
			before: Some(Box::new(move |_ctx, _data| b1.set(true))),
			after: Some(Box::new(move |_ctx, _data| a1.set(true))),
			error: None,
		},
		initial_data: Some(initial.clone()),
		watch_mask: Provider::FS,
	});
	rt.attach(listener.clone());

	let ctx = rt.create(Provider::TCP);
	assert!(!create_called.get());
	let stored = ctx.slot(listener.id()).flatten().expect("listener is attached");
	assert!(Rc::ptr_eq(&stored, &initial));

	rt.load(&ctx);
	rt.unload(&ctx);
	assert!(!before_called.get());
	assert!(!after_called.get());
	assert_eq!(rt.depth(), 0);
}

#[test]
fn nested_contexts_unwind_in_reverse_order() {
	let rt = HookRuntime::new();
	let log = Rc::new(Validator::<&'static str>::new());
	let (lb, la) = (log.clone(), log.clone());

	let listener = create_listener(ListenerOptions {
		callbacks: Callbacks {
			create: None,
			before: Some(Box::new(move |ctx, _data| {
				lb.push(if ctx.provider() == Provider::TCP { "before-c1" } else { "before-c2" });
			})),
			after: Some(Box::new(move |ctx, _data| {
				la.push(if ctx.provider() == Provider::TCP { "after-c1" } else { "after-c2" });
			})),
			error: None,
		},
		initial_data: None,
		watch_mask: Provider::TCP | Provider::TIMER,
	});
	rt.attach(listener);

	let c1 = rt.create(Provider::TCP);
	rt.load(&c1);
	let c2 = rt.create(Provider::TIMER);
	rt.load(&c2);
	rt.unload(&c2);
	rt.unload(&c1);

	log.expect(["before-c1", "before-c2", "after-c2", "after-c1"]);
	assert_eq!(rt.depth(), 0);
}

#[test]
fn error_listener_reports_handled_and_pops_the_context() {
	let rt = HookRuntime::new();
	let listener = create_listener(ListenerOptions {
		callbacks: Callbacks {
			error: Some(Box::new(|_ctx, _data, _err| true)),
			..Default::default()
		},
		initial_data: None,
		watch_mask: Provider::TCP,
	});
	rt.attach(listener);

	let ctx = rt.create(Provider::TCP);
	rt.load(&ctx);

	let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
	let handled = rt.error(&err);

	assert!(handled);
	assert_eq!(rt.depth(), 0);
}

#[test]
fn detach_removes_listener_from_every_context_on_the_stack() {
	let rt = HookRuntime::new();
	let listener = create_listener(ListenerOptions {
		callbacks: Callbacks::default(),
		initial_data: None,
		watch_mask: Provider::all(),
	});
	rt.attach(listener.clone());

	let c1 = rt.create(Provider::TCP);
	rt.load(&c1);
	let c2 = rt.create(Provider::TIMER);
	rt.load(&c2);

	rt.detach(&listener);

	assert!(c1.slot(listener.id()).is_none());
	assert!(c2.slot(listener.id()).is_none());
	assert!(rt.active().slot(listener.id()).is_none());
}

#[test]
fn scheduled_tick_creates_a_context_with_the_tick_provider() {
	let rt = HookRuntime::new();
	let created_with = Rc::new(std::cell::RefCell::new(None));
	let recorder = created_with.clone();

	let listener = create_listener(ListenerOptions {
		callbacks: Callbacks {
			create: Some(Box::new(move |_initial, name| {
				*recorder.borrow_mut() = Some(name.to_owned());
				None
			})),
			..Default::default()
		},
		initial_data: None,
		watch_mask: Provider::TCP,
	});
	rt.attach(listener);

	let scheduler = Scheduler::new(&rt);
	scheduler.next_tick(|| {});

	assert_eq!(created_with.borrow().as_deref(), Some("TICK"));
}
