/// Out-of-band track metadata delivered over a control channel, asynchronous
/// to the pipeline's own in-band `Track`/`DecodedStream` messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
	pub track: String,
	pub artist: String,
	pub album: String,
	pub genre: String,
	pub duration_ms: u32,
}
