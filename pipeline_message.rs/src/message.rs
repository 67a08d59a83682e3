use std::any::Any;
use std::sync::Arc;

use crate::jiffies::{jiffies_per_sample, Jiffies};
use crate::ramp::{RampDirection, RampValue};
use crate::track::Track;

/// Opaque handle to whatever downstream component answers seek/stop/play
/// requests for a stream. Carried through untouched by both elements in this
/// crate; out of scope beyond its identity.
pub type StreamHandlerRef = Arc<dyn Any + Send + Sync>;

/// A reference-counted pipeline message. Cloning the `Arc` is `add_ref`;
/// dropping it is `remove_ref`. There are no cycles in the message graph, so
/// plain `Arc` ownership (no `Weak`) is correct.
pub type MsgRef = Arc<Message>;

/// One tagged variant per message kind the pipeline carries end to end.
/// Only the fields the two elements in this workspace consult are modeled;
/// everything else (codec payloads, transport headers) is out of scope.
#[derive(Debug, Clone)]
pub enum Message {
	Mode(ModeMsg),
	Track(TrackMsg),
	Drain,
	Delay(DelayMsg),
	EncodedStream(EncodedStreamMsg),
	Metatext(MetatextMsg),
	StreamInterrupted,
	Halt,
	Flush(FlushMsg),
	Wait,
	DecodedStream(DecodedStreamMsg),
	BitRate(BitRateMsg),
	AudioPcm(AudioPcmMsg),
	AudioDsd(AudioDsdMsg),
	Silence(SilenceMsg),
	Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
	Mode,
	Track,
	Drain,
	Delay,
	EncodedStream,
	Metatext,
	StreamInterrupted,
	Halt,
	Flush,
	Wait,
	DecodedStream,
	BitRate,
	AudioPcm,
	AudioDsd,
	Silence,
	Quit,
}

impl Message {
	#[must_use]
	pub fn kind(&self) -> MessageKind {
		match self {
			Self::Mode(_) => MessageKind::Mode,
			Self::Track(_) => MessageKind::Track,
			Self::Drain => MessageKind::Drain,
			Self::Delay(_) => MessageKind::Delay,
			Self::EncodedStream(_) => MessageKind::EncodedStream,
			Self::Metatext(_) => MessageKind::Metatext,
			Self::StreamInterrupted => MessageKind::StreamInterrupted,
			Self::Halt => MessageKind::Halt,
			Self::Flush(_) => MessageKind::Flush,
			Self::Wait => MessageKind::Wait,
			Self::DecodedStream(_) => MessageKind::DecodedStream,
			Self::BitRate(_) => MessageKind::BitRate,
			Self::AudioPcm(_) => MessageKind::AudioPcm,
			Self::AudioDsd(_) => MessageKind::AudioDsd,
			Self::Silence(_) => MessageKind::Silence,
			Self::Quit => MessageKind::Quit,
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct ModeInfo {
	pub supports_latency: bool,
	pub ramp_pause_resume_long: bool,
}

#[derive(Debug, Clone)]
pub struct ModeMsg {
	pub name: String,
	pub info: ModeInfo,
}

#[derive(Debug, Clone)]
pub struct TrackMsg {
	pub track: Arc<Track>,
	pub start_of_stream: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayMsg {
	pub total_jiffies: u32,
}

#[derive(Debug, Clone, Default)]
pub struct EncodedStreamMsg {
	pub uri: String,
}

#[derive(Debug, Clone, Default)]
pub struct MetatextMsg {
	pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct BitRateMsg {
	pub bit_rate: u32,
}

/// Sentinel flush id: no flush pending / already retired.
pub const FLUSH_ID_INVALID: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushMsg {
	pub id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
	Pcm,
	Dsd,
}

#[derive(Debug, Clone)]
pub struct DecodedStreamMsg {
	pub stream_id: u32,
	pub bit_rate: u32,
	pub bit_depth: u32,
	pub sample_rate: u32,
	pub channels: u32,
	pub codec_name: String,
	pub track_length_jiffies: u64,
	pub start_sample: u64,
	pub lossless: bool,
	pub seekable: bool,
	pub live: bool,
	pub analog_bypass: bool,
	pub multiroom: bool,
	pub profile: String,
	pub format: StreamFormat,
	pub stream_handler: Option<StreamHandlerRef>,
	pub ramp: RampValue,
}

impl DecodedStreamMsg {
	/// A copy of `self` with `start_sample` overridden, used whenever a drop
	/// or out-of-band offset update requires a replacement descriptor with
	/// everything else unchanged.
	#[must_use]
	pub fn with_start_sample(&self, start_sample: u64) -> Self {
		Self {
			start_sample,
			..self.clone()
		}
	}
}

/// Stub result of [`AudioPcmMsg::create_playable`]/[`AudioDsdMsg::create_playable`]:
/// the hardware-facing representation a downstream sink would consume. Out of
/// scope beyond its signature — no codec/driver logic lives in this crate.
#[derive(Debug, Clone)]
pub struct PlayableAudio {
	pub jiffies: Jiffies,
	pub data: Arc<[u8]>,
}

#[derive(Debug, Clone)]
pub struct AudioPcmMsg {
	pub jiffies: Jiffies,
	pub sample_rate: u32,
	data: Arc<[u8]>,
}

impl AudioPcmMsg {
	#[must_use]
	pub fn new(jiffies: Jiffies, sample_rate: u32, data: Arc<[u8]>) -> Self {
		Self {
			jiffies,
			sample_rate,
			data,
		}
	}

	/// Splits off the tail beyond `at` jiffies, truncating `self` in place.
	/// Returns `None` if `at >= self.jiffies` (nothing left to split).
	#[must_use]
	pub fn split(&mut self, at: Jiffies) -> Option<Self> {
		let (remainder_jiffies, tail) = split_proportional(&mut self.jiffies, &mut self.data, at)?;
		Some(Self {
			jiffies: remainder_jiffies,
			sample_rate: self.sample_rate,
			data: tail,
		})
	}

	/// Applies an upward/downward gain ramp to (at most) the first `remaining`
	/// jiffies of `self` and returns the new ramp value, decrementing
	/// `remaining` by the number of jiffies actually ramped. `out_split` is
	/// populated only if `self` is longer than `remaining` jiffies; callers in
	/// this workspace always pre-split via [`Self::split`], so it stays `None`
	/// in practice (see DESIGN.md).
	pub fn set_ramp(
		&mut self,
		current: RampValue,
		remaining: &mut Jiffies,
		direction: RampDirection,
		out_split: &mut Option<Self>,
	) -> RampValue {
		if self.jiffies.inner() > remaining.inner() {
			*out_split = self.split(*remaining);
		}
		let ramped = self.jiffies.inner().min(remaining.inner());
		let target = match direction {
			RampDirection::Up => RampValue::MAX,
			RampDirection::Down => RampValue::MIN,
		};
		let new_value = interpolate_ramp(current, target, ramped, remaining.inner());
		*remaining = remaining.saturating_sub(Jiffies::new(ramped));
		new_value
	}

	#[must_use]
	pub fn create_playable(&self) -> PlayableAudio {
		PlayableAudio {
			jiffies: self.jiffies,
			data: self.data.clone(),
		}
	}
}

#[derive(Debug, Clone)]
pub struct AudioDsdMsg {
	pub jiffies: Jiffies,
	pub sample_rate: u32,
	data: Arc<[u8]>,
}

impl AudioDsdMsg {
	#[must_use]
	pub fn new(jiffies: Jiffies, sample_rate: u32, data: Arc<[u8]>) -> Self {
		Self {
			jiffies,
			sample_rate,
			data,
		}
	}

	#[must_use]
	pub fn split(&mut self, at: Jiffies) -> Option<Self> {
		let (remainder_jiffies, tail) = split_proportional(&mut self.jiffies, &mut self.data, at)?;
		Some(Self {
			jiffies: remainder_jiffies,
			sample_rate: self.sample_rate,
			data: tail,
		})
	}

	#[must_use]
	pub fn create_playable(&self) -> PlayableAudio {
		PlayableAudio {
			jiffies: self.jiffies,
			data: self.data.clone(),
		}
	}
}

/// Steps `current` a `ramped / horizon` fraction of the way towards `target`.
fn interpolate_ramp(current: RampValue, target: RampValue, ramped: u64, horizon: u64) -> RampValue {
	if horizon == 0 || ramped >= horizon {
		return target;
	}
	let span = i64::from(target.inner()) - i64::from(current.inner());
	let delta = (i128::from(span) * i128::from(ramped) / i128::from(horizon)) as i64;
	let stepped = i64::from(current.inner()) + delta;
	RampValue::new(stepped.clamp(0, i64::from(u32::MAX)) as u32)
}

/// Splits `data` into a head of `at` jiffies (kept in place via `jiffies`/`data`)
/// and a tail, proportioning the opaque byte buffer by jiffies fraction.
/// Returns `None` if there's nothing to split off.
fn split_proportional(jiffies: &mut Jiffies, data: &mut Arc<[u8]>, at: Jiffies) -> Option<(Jiffies, Arc<[u8]>)> {
	if at.inner() >= jiffies.inner() {
		return None;
	}
	let total_bytes = data.len();
	let split_point = if jiffies.inner() == 0 {
		0
	} else {
		(total_bytes as u128 * u128::from(at.inner()) / u128::from(jiffies.inner())) as usize
	};
	let head: Arc<[u8]> = Arc::from(&data[..split_point]);
	let tail: Arc<[u8]> = Arc::from(&data[split_point..]);
	let remainder_jiffies = jiffies.saturating_sub(at);
	*jiffies = at;
	*data = head;
	Some((remainder_jiffies, tail))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilenceMsg {
	pub jiffies: Jiffies,
	pub sample_rate: u32,
	pub bit_depth: u32,
	pub channels: u32,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn pcm(jiffies: u64, sample_rate: u32, len: usize) -> AudioPcmMsg {
		AudioPcmMsg::new(Jiffies::new(jiffies), sample_rate, Arc::from(vec![0u8; len]))
	}

	#[test]
	fn split_truncates_self_and_returns_remainder() {
		let mut msg = pcm(1000, 44_100, 100);
		let remainder = msg.split(Jiffies::new(400)).expect("remainder");
		assert_eq!(msg.jiffies, Jiffies::new(400));
		assert_eq!(remainder.jiffies, Jiffies::new(600));
		assert_eq!(msg.data.len() + remainder.data.len(), 100);
	}

	#[test]
	fn split_beyond_length_yields_no_remainder() {
		let mut msg = pcm(1000, 44_100, 100);
		assert!(msg.split(Jiffies::new(1000)).is_none());
		assert!(msg.split(Jiffies::new(2000)).is_none());
	}

	#[test]
	fn kind_matches_variant() {
		assert_eq!(Message::Quit.kind(), MessageKind::Quit);
		assert_eq!(Message::Halt.kind(), MessageKind::Halt);
	}

	#[test]
	fn jiffies_per_sample_used_for_duration_math() {
		let jps = jiffies_per_sample(44_100);
		assert_eq!(jps * 44_100, crate::jiffies::JIFFIES_PER_SECOND);
	}

	#[test]
	fn set_ramp_reaches_max_and_is_monotonic_across_messages() {
		let mut remaining = Jiffies::new(900);
		let mut current = RampValue::MIN;
		let mut last = current;
		for _ in 0..3 {
			let mut msg = pcm(300, 44_100, 30);
			let mut split = None;
			current = msg.set_ramp(current, &mut remaining, RampDirection::Up, &mut split);
			assert!(split.is_none(), "pre-sized messages should never need an internal split");
			assert!(current >= last);
			last = current;
		}
		assert_eq!(remaining, Jiffies::new(0));
		assert_eq!(current, RampValue::MAX);
	}

	#[test]
	fn set_ramp_splits_oversized_message() {
		let mut remaining = Jiffies::new(100);
		let mut msg = pcm(300, 44_100, 30);
		let mut split = None;
		let _ = msg.set_ramp(RampValue::MIN, &mut remaining, RampDirection::Up, &mut split);
		assert_eq!(msg.jiffies, Jiffies::new(100));
		assert!(split.is_some());
		assert_eq!(remaining, Jiffies::new(0));
	}
}
