pub mod element;
pub mod factory;
pub mod jiffies;
pub mod message;
pub mod metadata;
pub mod ramp;
pub mod track;

pub use element::{Animator, Element, StarvationRamper};
pub use factory::{rebuild_decoded_stream_with_start_sample, MsgFactory};
pub use jiffies::{
	jiffies_per_sample, jiffies_per_sample_checked, samples_in_jiffies, Jiffies, SampleRateError, JIFFIES_PER_SECOND,
};
pub use message::{
	AudioDsdMsg, AudioPcmMsg, BitRateMsg, DecodedStreamMsg, DelayMsg, EncodedStreamMsg, FlushMsg, Message,
	MessageKind, MetatextMsg, ModeInfo, ModeMsg, MsgRef, PlayableAudio, SilenceMsg, StreamFormat, StreamHandlerRef,
	TrackMsg, FLUSH_ID_INVALID,
};
pub use metadata::Metadata;
pub use ramp::{RampDirection, RampValue};
pub use track::{Track, TrackFactory};
