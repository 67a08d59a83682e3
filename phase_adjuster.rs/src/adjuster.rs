use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use mutex_ext::LockExt;
use pipeline_message::{Animator, Element, MsgRef, StarvationRamper};

use crate::config::PhaseAdjusterConfig;
use crate::state::AdjusterState;

/// Aligns playback phase between a sender's reported delay and this
/// receiver's own hardware delay by dropping a prefix of audio and ramping
/// gain back up, rather than letting the two drift apart silently.
///
/// `animator` and `starvation_ramper` model the device-facing collaborators:
/// the former reports fixed hardware delay, the latter lets the adjuster wait
/// for the downstream buffer to refill before resuming normal pulls after a
/// drop.
pub struct PhaseAdjuster {
	upstream: Box<dyn Element>,
	animator: Arc<dyn Animator>,
	starvation_ramper: Arc<dyn StarvationRamper>,
	config: PhaseAdjusterConfig,
	state: Mutex<AdjusterState>,
	/// Signed running sum of jiffies reported as entering (+) or draining (-)
	/// the downstream buffer. Written by the animator thread via `update`,
	/// read by the pull thread without a lock (see §5).
	tracked_jiffies: AtomicI64,
	audio_in: AtomicU64,
	audio_out: AtomicU64,
}

impl PhaseAdjuster {
	#[must_use]
	pub fn new(
		upstream: Box<dyn Element>,
		animator: Arc<dyn Animator>,
		starvation_ramper: Arc<dyn StarvationRamper>,
		config: PhaseAdjusterConfig,
	) -> Self {
		Self {
			upstream,
			animator,
			starvation_ramper,
			config,
			state: Mutex::new(AdjusterState::default()),
			tracked_jiffies: AtomicI64::new(0),
			audio_in: AtomicU64::new(0),
			audio_out: AtomicU64::new(0),
		}
	}

	/// Side door driven by the animator/device callback thread: reports that
	/// `delta` more jiffies of audio have entered (positive) or drained
	/// (negative) the downstream buffer since the last call.
	pub fn update(&self, delta: i64) {
		self.tracked_jiffies.fetch_add(delta, Ordering::Relaxed);
		if delta >= 0 {
			self.audio_in.fetch_add(delta as u64, Ordering::Relaxed);
		} else {
			self.audio_out.fetch_add(delta.unsigned_abs(), Ordering::Relaxed);
		}
	}

	#[must_use]
	pub fn tracked_jiffies(&self) -> i64 {
		self.tracked_jiffies.load(Ordering::Relaxed)
	}

	#[must_use]
	pub fn audio_in(&self) -> u64 {
		self.audio_in.load(Ordering::Relaxed)
	}

	#[must_use]
	pub fn audio_out(&self) -> u64 {
		self.audio_out.load(Ordering::Relaxed)
	}
}

impl Element for PhaseAdjuster {
	fn pull(&mut self) -> MsgRef {
		loop {
			if let Some(msg) = self
				.state
				.with_lock_mut(|s| s.pending_out.pop_front())
				.expect("mutex poisoned")
			{
				return msg;
			}

			let upstream_msg = self.upstream.pull();
			let tracked_jiffies = self.tracked_jiffies();

			let (mut emitted, need_wait) = self
				.state
				.with_lock_mut(|s| {
					let out = s.handle_upstream(upstream_msg, tracked_jiffies, self.animator.as_ref(), &self.config);
					let need_wait = s.need_occupancy_wait;
					s.need_occupancy_wait = false;
					(out, need_wait)
				})
				.expect("mutex poisoned");

			// Dropping audio may have left the downstream buffer momentarily
			// starved; wait for it to refill outside the lock, so side-door
			// callers aren't blocked on a potentially long wait (see §5).
			if need_wait {
				self.starvation_ramper.wait_for_occupancy(self.animator.buffer_jiffies());
			}

			if emitted.is_empty() {
				continue;
			}
			let first = emitted.remove(0);
			if !emitted.is_empty() {
				self.state
					.with_lock_mut(|s| s.pending_out.extend(emitted))
					.expect("mutex poisoned");
			}
			return first;
		}
	}
}
