use crate::jiffies::Jiffies;
use crate::message::{MsgRef, StreamFormat};

/// Uniform pull interface every element in the chain exposes: block until one
/// message is available. A single thread calls `pull` on any given element
/// (see spec §5); side-door mutation (AirplayReporter's metadata/offset
/// setters, PhaseAdjuster's `update` callback) comes from other threads and
/// is not part of this trait. `Sync` is required even though `pull` takes
/// `&mut self`, so elements that hold one in a `Box<dyn Element>` field (as
/// both elements in this workspace do) stay `Sync` themselves and can be
/// shared behind an `Arc` with their side-door threads.
pub trait Element: Send + Sync {
	fn pull(&mut self) -> MsgRef;
}

/// Collaborator, downstream of PhaseAdjuster: waits until the downstream
/// buffer holds at least `jiffies` of queued audio. Used to avoid pulling
/// immediately after a drop, when the buffer may be momentarily starved.
pub trait StarvationRamper: Send + Sync {
	fn wait_for_occupancy(&self, jiffies: Jiffies);
}

/// Collaborator, device-facing: reports the fixed hardware delay and total
/// buffer size, both in jiffies.
pub trait Animator: Send + Sync {
	fn delay_jiffies(&self, format: StreamFormat, sample_rate: u32, bit_depth: u32, channels: u32) -> u32;
	fn buffer_jiffies(&self) -> Jiffies;
}
