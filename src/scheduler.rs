//! A minimal cooperative scheduler exercising the wrapping contract that a
//! real reactor's timers, next-tick queue and immediates all follow.
//!
//! This is not a full user-space event loop; it's the smallest useful
//! stand-in for one, so the wrapping contract applied to next-tick,
//! immediate, timeout and interval callbacks can be demonstrated and tested
//! without a real native reactor underneath.

use std::{
	cell::{Cell, RefCell},
	cmp::Reverse,
	collections::{BinaryHeap, VecDeque},
	panic::{catch_unwind, resume_unwind, AssertUnwindSafe},
	time::{Duration, Instant},
};

use crate::{context::ContextHandle, provider::Provider, runtime::HookRuntime};

/// Identifies a scheduled timeout or interval for later cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

struct Timer {
	deadline: Instant,
	interval: Option<Duration>,
	id: TimerId,
	context: ContextHandle,
	callback: Box<dyn FnMut()>,
}

impl PartialEq for Timer {
	fn eq(&self, other: &Self) -> bool {
		self.deadline == other.deadline && self.id == other.id
	}
}
impl Eq for Timer {}
impl PartialOrd for Timer {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}
impl Ord for Timer {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.deadline.cmp(&other.deadline).then(self.id.cmp(&other.id))
	}
}

/// A cooperative, single-threaded scheduler. Every callback it dispatches is
/// wrapped in `load`/`unload` around a context built by `create`, the same
/// wrapping every primitive family (tick, immediate, timeout, interval)
/// goes through.
pub struct Scheduler<'rt> {
	runtime: &'rt HookRuntime,
	ticks: RefCell<VecDeque<(ContextHandle, Box<dyn FnOnce()>)>>,
	immediates: RefCell<VecDeque<(ContextHandle, Box<dyn FnOnce()>)>>,
	timers: RefCell<BinaryHeap<Reverse<Timer>>>,
	next_timer_id: Cell<u64>,
}

impl<'rt> Scheduler<'rt> {
	#[must_use]
	pub fn new(runtime: &'rt HookRuntime) -> Self {
		Self {
			runtime,
			ticks: RefCell::new(VecDeque::new()),
			immediates: RefCell::new(VecDeque::new()),
			timers: RefCell::new(BinaryHeap::new()),
			next_timer_id: Cell::new(0),
		}
	}

	fn run_wrapped(&self, ctx: &ContextHandle, cb: Box<dyn FnOnce()>) {
		self.runtime.load(ctx);
		let result = catch_unwind(AssertUnwindSafe(cb));
		self.runtime.unload(ctx);
		if let Err(payload) = result {
			resume_unwind(payload);
		}
	}

	/// Queues `cb` on the next-tick queue. `create(cb, TICK)` runs
	/// unconditionally before the wrapper is installed: the `TICK` sentinel
	/// matches every watch mask, so there's no fast path to skip.
	pub fn next_tick(&self, cb: impl FnOnce() + 'static) {
		let ctx = self.runtime.create(Provider::TICK);
		self.ticks.borrow_mut().push_back((ctx, Box::new(cb)));
	}

	/// Queues `cb` on the immediate queue, which drains after the next-tick
	/// queue is empty.
	pub fn set_immediate(&self, cb: impl FnOnce() + 'static) {
		let ctx = self.runtime.create(Provider::TICK);
		self.immediates.borrow_mut().push_back((ctx, Box::new(cb)));
	}

	/// Schedules `cb` to run once after `delay`. The timer's context is
	/// created only if the Status Word shows the active listener queue is
	/// non-empty; otherwise it gets an empty context with no listeners,
	/// since nobody would observe its creation anyway.
	pub fn set_timeout(&self, delay: Duration, cb: impl FnMut() + 'static) -> TimerId {
		self.schedule(delay, None, cb)
	}

	/// Like [`set_timeout`](Self::set_timeout), but reschedules itself every
	/// `period` until cancelled with [`clear_timer`](Self::clear_timer).
	pub fn set_interval(&self, period: Duration, cb: impl FnMut() + 'static) -> TimerId {
		self.schedule(period, Some(period), cb)
	}

	fn schedule(&self, delay: Duration, interval: Option<Duration>, cb: impl FnMut() + 'static) -> TimerId {
		let ctx = if self.runtime.status().active_queue_length > 0 {
			self.runtime.create(Provider::TIMER)
		} else {
			ContextHandle::empty(Provider::TIMER)
		};
		let id = TimerId(self.next_timer_id.get());
		self.next_timer_id.set(id.0 + 1);
		self.timers.borrow_mut().push(Reverse(Timer {
			deadline: Instant::now() + delay,
			interval,
			id,
			context: ctx,
			callback: Box::new(cb),
		}));
		id
	}

	/// Cancels a pending timeout or interval. A no-op if it already fired or
	/// the id is unknown.
	pub fn clear_timer(&self, id: TimerId) {
		self.timers.borrow_mut().retain(|Reverse(t)| t.id != id);
	}

	/// Drains the next-tick queue to completion (ticks may enqueue further
	/// ticks, which also run before this returns), runs at most one queued
	/// immediate, then fires every timer due by `now`.
	pub fn run_once(&self, now: Instant) {
		self.drain_ticks();
		if let Some((ctx, cb)) = self.immediates.borrow_mut().pop_front() {
			self.run_wrapped(&ctx, cb);
			self.drain_ticks();
		}
		self.run_due_timers(now);
	}

	fn drain_ticks(&self) {
		while let Some((ctx, cb)) = self.ticks.borrow_mut().pop_front() {
			self.run_wrapped(&ctx, cb);
		}
	}

	fn run_due_timers(&self, now: Instant) {
		loop {
			let due = matches!(self.timers.borrow().peek(), Some(Reverse(t)) if t.deadline <= now);
			if !due {
				break;
			}
			let Reverse(Timer {
				interval,
				id,
				context,
				mut callback,
				..
			}) = self.timers.borrow_mut().pop().expect("checked non-empty above");

			self.runtime.load(&context);
			let result = catch_unwind(AssertUnwindSafe(|| callback()));
			self.runtime.unload(&context);

			if let Some(period) = interval {
				self.timers.borrow_mut().push(Reverse(Timer {
					deadline: now + period,
					interval: Some(period),
					id,
					context,
					callback,
				}));
			}
			if let Err(payload) = result {
				resume_unwind(payload);
			}
		}
	}

	/// Runs ticks, immediates and due timers repeatedly until nothing is
	/// ready at `now`.
	pub fn run_until_idle(&self, now: Instant) {
		loop {
			let has_timer_due = matches!(self.timers.borrow().peek(), Some(Reverse(t)) if t.deadline <= now);
			let has_work = !self.ticks.borrow().is_empty() || !self.immediates.borrow().is_empty() || has_timer_due;
			if !has_work {
				break;
			}
			self.run_once(now);
		}
	}
}
