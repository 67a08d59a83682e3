use std::sync::Arc;

use crate::message::{
	DecodedStreamMsg, Message, MsgRef, SilenceMsg, StreamFormat, StreamHandlerRef, TrackMsg,
};
use crate::ramp::RampValue;
use crate::track::Track;

/// Collaborator: constructs reference-counted messages of each kind. Zero
/// state, like [`crate::track::TrackFactory`] — grouping construction behind
/// a stable API is the only reason this exists as a type rather than free
/// functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgFactory;

impl MsgFactory {
	#[must_use]
	pub fn create_msg_track(&self, track: Arc<Track>, start_of_stream: bool) -> MsgRef {
		Arc::new(Message::Track(TrackMsg {
			track,
			start_of_stream,
		}))
	}

	#[must_use]
	#[allow(clippy::too_many_arguments)]
	pub fn create_msg_decoded_stream(
		&self,
		stream_id: u32,
		bit_rate: u32,
		bit_depth: u32,
		sample_rate: u32,
		channels: u32,
		codec_name: impl Into<String>,
		track_length_jiffies: u64,
		start_sample: u64,
		lossless: bool,
		seekable: bool,
		live: bool,
		analog_bypass: bool,
		multiroom: bool,
		profile: impl Into<String>,
		format: StreamFormat,
		stream_handler: Option<StreamHandlerRef>,
		ramp: RampValue,
	) -> MsgRef {
		Arc::new(Message::DecodedStream(DecodedStreamMsg {
			stream_id,
			bit_rate,
			bit_depth,
			sample_rate,
			channels,
			codec_name: codec_name.into(),
			track_length_jiffies,
			start_sample,
			lossless,
			seekable,
			live,
			analog_bypass,
			multiroom,
			profile: profile.into(),
			format,
			stream_handler,
			ramp,
		}))
	}

	#[must_use]
	pub fn create_msg_silence(
		&self,
		jiffies: crate::jiffies::Jiffies,
		sample_rate: u32,
		bit_depth: u32,
		channels: u32,
	) -> MsgRef {
		Arc::new(Message::Silence(SilenceMsg {
			jiffies,
			sample_rate,
			bit_depth,
			channels,
		}))
	}
}

/// Builds a [`DecodedStreamMsg`] that is a copy of `source` with `start_sample`
/// overridden, matching every other field. Used by both elements to emit a
/// replacement descriptor after a sample-offset-affecting edit.
#[must_use]
pub fn rebuild_decoded_stream_with_start_sample(source: &DecodedStreamMsg, start_sample: u64) -> MsgRef {
	Arc::new(Message::DecodedStream(source.with_start_sample(start_sample)))
}
