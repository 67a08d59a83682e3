use std::sync::Mutex;

use mutex_ext::LockExt;
use pipeline_message::{
	rebuild_decoded_stream_with_start_sample, samples_in_jiffies, DecodedStreamMsg, Element, FlushMsg, Message,
	MessageKind, Metadata, ModeMsg, MsgFactory, MsgRef, TrackFactory, TrackMsg, FLUSH_ID_INVALID, JIFFIES_PER_SECOND,
};

use crate::didl;
use crate::start_offset::StartOffset;

/// Configures which upstream `Mode` name marks a stream as carrying
/// out-of-band metadata, and how much a corrected track offset must move
/// before it is worth re-announcing downstream.
#[derive(Debug, Clone)]
pub struct AirplayReporterConfig {
	pub intercept_mode_name: String,
	pub track_offset_change_threshold_ms: u32,
}

impl Default for AirplayReporterConfig {
	fn default() -> Self {
		Self {
			intercept_mode_name: "AirPlay2".to_string(),
			track_offset_change_threshold_ms: 300,
		}
	}
}

struct ReporterState {
	intercept_mode_name: String,
	track_offset_change_threshold_ms: u32,
	intercept_mode: bool,
	pipeline_track_seen: bool,
	track_uri: String,
	metadata: Option<Metadata>,
	track_duration_ms: u32,
	start_offset: StartOffset,
	decoded_stream: Option<DecodedStreamMsg>,
	generated_track_pending: bool,
	decoded_stream_pending: bool,
	samples: u64,
	pending_flush_id: u32,
}

impl ReporterState {
	fn new(intercept_mode_name: String, track_offset_change_threshold_ms: u32) -> Self {
		Self {
			intercept_mode_name,
			track_offset_change_threshold_ms,
			intercept_mode: false,
			pipeline_track_seen: false,
			track_uri: String::new(),
			metadata: None,
			track_duration_ms: 0,
			start_offset: StartOffset::new(),
			decoded_stream: None,
			generated_track_pending: false,
			decoded_stream_pending: false,
			samples: 0,
			pending_flush_id: FLUSH_ID_INVALID,
		}
	}

	/// Step 1 of the pull algorithm (§4.2): while intercepting with a track
	/// and a decoded stream both established, emit at most one synthesized
	/// descriptor per call — a pending `Track` always ahead of a pending
	/// `DecodedStream`, so invariant 3.2.2 holds across however many calls it
	/// takes to drain both.
	fn try_synthesize(&mut self, track_factory: &TrackFactory, msg_factory: &MsgFactory) -> Option<MsgRef> {
		if !(self.intercept_mode && self.pipeline_track_seen && self.decoded_stream.is_some()) {
			return None;
		}
		let stream = self.decoded_stream.clone()?;
		if self.generated_track_pending {
			self.generated_track_pending = false;
			let metadata = self.metadata.clone().unwrap_or_default();
			let didl = didl::write(&self.track_uri, &metadata, stream.bit_depth, stream.channels, stream.sample_rate);
			let track = track_factory.create_track(self.track_uri.clone(), didl.into_bytes());
			Some(msg_factory.create_msg_track(track, false))
		} else if self.decoded_stream_pending {
			self.decoded_stream_pending = false;
			let track_length_jiffies = u64::from(self.track_duration_ms) * JIFFIES_PER_SECOND / 1000;
			let start_sample = self.start_offset.offset_sample(stream.sample_rate);
			let rebuilt = DecodedStreamMsg {
				track_length_jiffies,
				..stream
			};
			let msg = rebuild_decoded_stream_with_start_sample(&rebuilt, start_sample);
			let Message::DecodedStream(cached) = msg.as_ref() else {
				unreachable!("rebuild_decoded_stream_with_start_sample always returns a DecodedStream")
			};
			self.decoded_stream = Some(cached.clone());
			Some(msg)
		} else {
			None
		}
	}

	/// Step 3 of the pull algorithm: dispatch a message pulled from
	/// upstream. Returns `None` when the message is consumed rather than
	/// forwarded (a real `DecodedStream`, folded into cached state instead).
	fn handle_upstream(&mut self, msg: MsgRef) -> Option<MsgRef> {
		match msg.kind() {
			MessageKind::Mode => {
				let Message::Mode(mode) = msg.as_ref() else {
					unreachable!("declared kind mismatch")
				};
				self.handle_mode(mode);
				Some(msg)
			}
			MessageKind::Track => {
				let Message::Track(track) = msg.as_ref() else {
					unreachable!("declared kind mismatch")
				};
				self.handle_track(track);
				Some(msg)
			}
			MessageKind::DecodedStream => self.handle_decoded_stream(msg),
			MessageKind::AudioPcm => {
				let Message::AudioPcm(pcm) = msg.as_ref() else {
					unreachable!("declared kind mismatch")
				};
				self.accumulate_samples(pcm.jiffies.inner(), pcm.sample_rate);
				Some(msg)
			}
			// AirplayReporter has no ProcessMsg override for DSD audio in the
			// original source: only MsgAudioPcm feeds the sample counter, so
			// AudioDsd is forwarded like any other kind outside the handler
			// table (§4.2).
			MessageKind::Flush => {
				let Message::Flush(FlushMsg { id }) = msg.as_ref() else {
					unreachable!("declared kind mismatch")
				};
				if self.intercept_mode && *id >= self.pending_flush_id {
					self.pending_flush_id = FLUSH_ID_INVALID;
				}
				Some(msg)
			}
			_ => Some(msg),
		}
	}

	fn handle_mode(&mut self, mode: &ModeMsg) {
		if mode.name == self.intercept_mode_name {
			// Whether this is a fresh entry into intercept mode or a
			// reaffirming Mode seen while already intercepting, the effect is
			// the same: the next decoded stream needs fresh announcing and
			// the sample counter restarts for the new stream.
			self.decoded_stream_pending = true;
			self.samples = 0;
			self.intercept_mode = true;
			self.decoded_stream = None;
			self.pipeline_track_seen = false;
		} else {
			self.intercept_mode = false;
		}
	}

	fn handle_track(&mut self, track: &TrackMsg) {
		if self.intercept_mode {
			self.track_uri = track.track.uri.clone();
			self.pipeline_track_seen = true;
			self.generated_track_pending = true;
		}
	}

	fn handle_decoded_stream(&mut self, msg: MsgRef) -> Option<MsgRef> {
		if !self.intercept_mode {
			return Some(msg);
		}
		let Message::DecodedStream(stream) = msg.as_ref() else {
			unreachable!("declared kind mismatch")
		};
		assert!(
			stream.sample_rate != 0 && stream.channels != 0,
			"DecodedStream with zero sample_rate or channels"
		);
		self.decoded_stream = Some(stream.clone());
		self.decoded_stream_pending = true;
		None
	}

	fn accumulate_samples(&mut self, jiffies: u64, sample_rate: u32) {
		if !self.intercept_mode {
			return;
		}
		assert!(
			self.decoded_stream.is_some(),
			"AudioPcm received before any DecodedStream while intercepting"
		);
		if self.pending_flush_id == FLUSH_ID_INVALID {
			let samples_in_msg = samples_in_jiffies(jiffies, sample_rate);
			self.samples = self.samples.checked_add(samples_in_msg).expect("sample counter overflow");
		}
	}
}

/// Intercepts a stream during a configured mode to fabricate `Track`/
/// `DecodedStream` messages from metadata that arrives out of band, keeping
/// a running count of samples seen so a fabricated descriptor's `start_sample`
/// reflects the listener's actual position.
pub struct AirplayReporter {
	upstream: Box<dyn Element>,
	state: Mutex<ReporterState>,
	track_factory: TrackFactory,
	msg_factory: MsgFactory,
}

impl AirplayReporter {
	#[must_use]
	pub fn new(upstream: Box<dyn Element>, config: AirplayReporterConfig) -> Self {
		Self {
			upstream,
			state: Mutex::new(ReporterState::new(
				config.intercept_mode_name,
				config.track_offset_change_threshold_ms,
			)),
			track_factory: TrackFactory,
			msg_factory: MsgFactory,
		}
	}

	/// Records metadata that arrived out of band for the currently playing
	/// track. `None` clears the cache (e.g. the control channel lost the
	/// track) but still marks both synthesized descriptors as due for
	/// re-announcement.
	pub fn metadata_changed(&self, metadata: Option<Metadata>) {
		self.state
			.with_lock_mut(|s| {
				if let Some(m) = &metadata {
					s.track_duration_ms = m.duration_ms;
				}
				s.metadata = metadata;
				s.generated_track_pending = true;
				s.decoded_stream_pending = true;
			})
			.expect("mutex poisoned");
	}

	/// Records a corrected track position, in milliseconds, that is known to
	/// be authoritative (e.g. a seek), unconditionally re-announcing the
	/// decoded stream.
	pub fn track_offset_changed(&self, offset_ms: u32) {
		self.state
			.with_lock_mut(|s| {
				s.start_offset.set_ms(offset_ms);
				s.decoded_stream_pending = true;
			})
			.expect("mutex poisoned");
	}

	/// Records an observed playback position, in milliseconds. Only
	/// re-announces the decoded stream once the position has drifted past the
	/// configured threshold, to avoid a storm of near-identical
	/// `DecodedStream` messages for sub-threshold jitter.
	pub fn track_position(&self, offset_ms: u32) {
		self.state
			.with_lock_mut(|s| {
				let drift = s.start_offset.absolute_difference(offset_ms);
				s.start_offset.set_ms(offset_ms);
				if drift > s.track_offset_change_threshold_ms {
					s.decoded_stream_pending = true;
				}
			})
			.expect("mutex poisoned");
	}

	/// Adds `samples` to the running sample counter, for callers that track
	/// playback position out of band entirely (bypassing in-pipeline audio).
	pub fn report_samples(&self, samples: u64) {
		self.state
			.with_lock_mut(|s| s.samples = s.samples.checked_add(samples).expect("sample counter overflow"))
			.expect("mutex poisoned");
	}

	pub fn reset_sample_count(&self) {
		self.state.with_lock_mut(|s| s.samples = 0).expect("mutex poisoned");
	}

	/// Marks `id` as the flush above which sample accumulation may resume;
	/// PCM consumed before a matching `Flush` message arrives does not
	/// advance the sample counter (§3.2 invariant 4).
	pub fn flush(&self, id: u32) {
		self.state.with_lock_mut(|s| s.pending_flush_id = id).expect("mutex poisoned");
	}

	#[must_use]
	pub fn samples(&self) -> u64 {
		self.state.with_lock(|s| s.samples).expect("mutex poisoned")
	}
}

impl Element for AirplayReporter {
	fn pull(&mut self) -> MsgRef {
		loop {
			if let Some(msg) = self
				.state
				.with_lock_mut(|s| s.try_synthesize(&self.track_factory, &self.msg_factory))
				.expect("mutex poisoned")
			{
				return msg;
			}

			let upstream_msg = self.upstream.pull();

			if let Some(msg) = self
				.state
				.with_lock_mut(|s| s.handle_upstream(upstream_msg))
				.expect("mutex poisoned")
			{
				return msg;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::collections::VecDeque as StdVecDeque;
	use std::sync::Arc;

	use pipeline_message::{Jiffies, ModeInfo, RampValue, StreamFormat};

	use super::*;

	struct ScriptedUpstream {
		messages: StdVecDeque<MsgRef>,
	}

	impl ScriptedUpstream {
		fn new(messages: Vec<MsgRef>) -> Self {
			Self {
				messages: messages.into(),
			}
		}
	}

	impl Element for ScriptedUpstream {
		fn pull(&mut self) -> MsgRef {
			self.messages.pop_front().expect("upstream exhausted")
		}
	}

	fn mode(name: &str) -> MsgRef {
		Arc::new(Message::Mode(ModeMsg {
			name: name.to_string(),
			info: ModeInfo::default(),
		}))
	}

	fn track(uri: &str, start_of_stream: bool) -> MsgRef {
		Arc::new(Message::Track(TrackMsg {
			track: TrackFactory.create_track(uri, Vec::new()),
			start_of_stream,
		}))
	}

	fn decoded_stream(sample_rate: u32) -> MsgRef {
		MsgFactory.create_msg_decoded_stream(
			1,
			0,
			16,
			sample_rate,
			2,
			"pcm",
			0,
			0,
			true,
			false,
			true,
			false,
			false,
			"airplay",
			StreamFormat::Pcm,
			None,
			RampValue::MAX,
		)
	}

	fn pcm(jiffies: u64, sample_rate: u32) -> MsgRef {
		Arc::new(Message::AudioPcm(pipeline_message::AudioPcmMsg::new(
			Jiffies::new(jiffies),
			sample_rate,
			Arc::from(vec![0u8; 4]),
		)))
	}

	#[test]
	fn passes_through_unchanged_outside_intercept_mode() {
		let upstream = ScriptedUpstream::new(vec![mode("Songcast"), track("u", true), decoded_stream(44_100), pcm(1000, 44_100)]);
		let mut reporter = AirplayReporter::new(Box::new(upstream), AirplayReporterConfig::default());
		assert!(matches!(reporter.pull().kind(), MessageKind::Mode));
		assert!(matches!(reporter.pull().kind(), MessageKind::Track));
		assert!(matches!(reporter.pull().kind(), MessageKind::DecodedStream));
		assert!(matches!(reporter.pull().kind(), MessageKind::AudioPcm));
		assert_eq!(reporter.samples(), 0);
	}

	#[test]
	fn real_track_is_forwarded_even_while_intercepting() {
		let upstream = ScriptedUpstream::new(vec![mode("AirPlay2"), track("u1", true), decoded_stream(44_100)]);
		let mut reporter = AirplayReporter::new(Box::new(upstream), AirplayReporterConfig::default());
		assert!(matches!(reporter.pull().kind(), MessageKind::Mode));
		// The in-band Track is forwarded, not swallowed: invariant 3.2.2 only
		// governs ordering of *synthesized* messages relative to each other.
		let forwarded = reporter.pull();
		assert!(matches!(forwarded.kind(), MessageKind::Track));
		// The real DecodedStream is suppressed; the next pull drains the
		// synthesized Track that became due once pipeline_track_seen and
		// decoded_stream were both set, without ever handing the real one back.
		let synthesized_track = reporter.pull();
		assert!(matches!(synthesized_track.kind(), MessageKind::Track));
		let synthesized_stream = reporter.pull();
		assert!(matches!(synthesized_stream.kind(), MessageKind::DecodedStream));
	}

	#[test]
	fn fabricates_track_and_decoded_stream_pair_once_metadata_arrives() {
		let upstream = ScriptedUpstream::new(vec![mode("AirPlay2"), track("airplay://live", true), decoded_stream(44_100)]);
		let mut reporter = AirplayReporter::new(Box::new(upstream), AirplayReporterConfig::default());
		reporter.metadata_changed(Some(Metadata {
			track: "Song".to_string(),
			artist: "Artist".to_string(),
			album: "Album".to_string(),
			genre: "Genre".to_string(),
			duration_ms: 5000,
		}));
		reporter.track_offset_changed(2000);

		assert!(matches!(reporter.pull().kind(), MessageKind::Mode));
		// The real Track, forwarded unchanged.
		assert!(matches!(reporter.pull().kind(), MessageKind::Track));
		// The real DecodedStream is consumed inside this same pull(): once
		// pipeline_track_seen and decoded_stream are both set, the loop
		// synthesizes the pending Track instead of ever returning the real
		// DecodedStream back to the caller.
		let synthesized_track = reporter.pull();
		assert!(matches!(synthesized_track.kind(), MessageKind::Track));
		let Message::Track(t) = synthesized_track.as_ref() else {
			panic!("expected Track");
		};
		let metadata_blob = String::from_utf8(t.track.metadata_blob.clone()).unwrap();
		assert!(metadata_blob.contains("duration=\"00:00:05\""));

		let synthesized_stream = reporter.pull();
		let Message::DecodedStream(stream) = synthesized_stream.as_ref() else {
			panic!("expected DecodedStream");
		};
		assert_eq!(stream.start_sample, 2000 * 44_100 / 1000);
	}

	#[test]
	fn audio_dsd_does_not_advance_sample_count_while_intercepting() {
		let dsd = Arc::new(Message::AudioDsd(pipeline_message::AudioDsdMsg::new(
			Jiffies::new(pipeline_message::jiffies_per_sample(44_100) * 2),
			44_100,
			Arc::from(vec![0u8; 8]),
		)));
		let upstream = ScriptedUpstream::new(vec![mode("AirPlay2"), track("u", true), decoded_stream(44_100), dsd]);
		let mut reporter = AirplayReporter::new(Box::new(upstream), AirplayReporterConfig::default());
		while !matches!(reporter.pull().kind(), MessageKind::DecodedStream) {}
		assert!(matches!(reporter.pull().kind(), MessageKind::AudioDsd));
		assert_eq!(reporter.samples(), 0, "only AudioPcm feeds the sample counter, per the original source");
	}

	#[test]
	fn accumulates_sample_count_from_audio_pcm_while_intercepting() {
		let two_samples_in_jiffies = pipeline_message::jiffies_per_sample(44_100) * 2;
		let upstream = ScriptedUpstream::new(vec![
			mode("AirPlay2"),
			track("u", true),
			decoded_stream(44_100),
			pcm(two_samples_in_jiffies, 44_100),
		]);
		let mut reporter = AirplayReporter::new(Box::new(upstream), AirplayReporterConfig::default());
		let _ = reporter.pull(); // Mode
		let _ = reporter.pull(); // real Track
		let _ = reporter.pull(); // synthesized Track
		let _ = reporter.pull(); // synthesized DecodedStream
		let _ = reporter.pull(); // AudioPcm, forwarded and counted
		assert_eq!(reporter.samples(), 2);
	}

	#[test]
	fn flush_suppresses_sample_accumulation_until_matching_flush_message() {
		let upstream = ScriptedUpstream::new(vec![
			mode("AirPlay2"),
			track("u", true),
			decoded_stream(44_100),
			Arc::new(Message::Flush(FlushMsg { id: 6 })),
			pcm(pipeline_message::jiffies_per_sample(44_100), 44_100),
			Arc::new(Message::Flush(FlushMsg { id: 7 })),
			pcm(pipeline_message::jiffies_per_sample(44_100), 44_100),
		]);
		let mut reporter = AirplayReporter::new(Box::new(upstream), AirplayReporterConfig::default());
		reporter.flush(7);

		while !matches!(reporter.pull().kind(), MessageKind::DecodedStream) {}
		assert!(matches!(reporter.pull().kind(), MessageKind::Flush)); // id 6, below pending_flush_id, stays pending
		assert!(matches!(reporter.pull().kind(), MessageKind::AudioPcm));
		assert_eq!(reporter.samples(), 0, "flush(7) pending: audio before Flush(7) must not count");
		assert!(matches!(reporter.pull().kind(), MessageKind::Flush)); // id 7, clears pending_flush_id
		assert!(matches!(reporter.pull().kind(), MessageKind::AudioPcm));
		assert_eq!(reporter.samples(), 1, "audio after Flush(7) counts normally");
	}

	#[test]
	fn reaffirming_intercept_mode_resets_sample_count_and_requeues_decoded_stream() {
		let upstream = ScriptedUpstream::new(vec![
			mode("AirPlay2"),
			track("u", true),
			decoded_stream(44_100),
			mode("AirPlay2"),
			track("u", true),
			decoded_stream(44_100),
		]);
		let mut reporter = AirplayReporter::new(Box::new(upstream), AirplayReporterConfig::default());
		assert!(matches!(reporter.pull().kind(), MessageKind::Mode));
		assert!(matches!(reporter.pull().kind(), MessageKind::Track)); // real
		assert!(matches!(reporter.pull().kind(), MessageKind::Track)); // synthesized
		assert!(matches!(reporter.pull().kind(), MessageKind::DecodedStream)); // synthesized
		reporter.report_samples(1000);
		assert_eq!(reporter.samples(), 1000);

		// A second Mode reaffirming the same intercept name resets the sample
		// counter and clears pipeline_track_seen/decoded_stream, so the whole
		// Track/DecodedStream synthesis has to happen again from the next
		// real Track and DecodedStream onward.
		assert!(matches!(reporter.pull().kind(), MessageKind::Mode));
		assert_eq!(reporter.samples(), 0);
		assert!(matches!(reporter.pull().kind(), MessageKind::Track)); // real
		assert!(matches!(reporter.pull().kind(), MessageKind::Track)); // synthesized
		assert!(matches!(reporter.pull().kind(), MessageKind::DecodedStream)); // synthesized
	}
}
