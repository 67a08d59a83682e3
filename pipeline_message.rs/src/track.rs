use std::sync::Arc;

/// Track identity: a URI plus an opaque metadata blob (e.g. DIDL-Lite XML).
/// Carries no behavior of its own — codec/track-database concerns are out of
/// scope for this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
	pub uri: String,
	pub metadata_blob: Vec<u8>,
}

/// Collaborator: constructs [`Track`] identities. Zero-sized, mirroring the
/// teacher's zero-state `*Builder` constructors that exist purely to group a
/// fallible construction step behind a stable API.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackFactory;

impl TrackFactory {
	#[must_use]
	pub fn create_track(&self, uri: impl Into<String>, metadata_blob: Vec<u8>) -> Arc<Track> {
		Arc::new(Track {
			uri: uri.into(),
			metadata_blob,
		})
	}
}
