use std::fmt::Write as _;

use pipeline_message::Metadata;

/// Serializes `metadata` and `uri` into a DIDL-Lite XML fragment suitable for
/// use as a synthesized `Track`'s metadata blob.
///
/// `bit_depth`/`channels`/`sample_rate` are `0` when unknown; the
/// corresponding `<res>` attributes (and `size`) are then omitted.
#[must_use]
pub fn write(uri: &str, metadata: &Metadata, bit_depth: u32, channels: u32, sample_rate: u32) -> String {
	let mut out = String::new();
	out.push_str("<DIDL-Lite xmlns:dc=\"http://purl.org/dc/elements/1.1/\" ");
	out.push_str("xmlns:upnp=\"urn:schemas-upnp-org:metadata-1-0/upnp/\" ");
	out.push_str("xmlns=\"urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/\">");
	out.push_str("<item id=\"0\" parentID=\"0\" restricted=\"True\">");

	out.push_str("<dc:title>");
	write_escaped(&mut out, &metadata.track);
	out.push_str("</dc:title>");

	out.push_str("<upnp:artist>");
	write_escaped(&mut out, &metadata.artist);
	out.push_str("</upnp:artist>");

	out.push_str("<upnp:album>");
	write_escaped(&mut out, &metadata.album);
	out.push_str("</upnp:album>");

	out.push_str("<upnp:genre>");
	write_escaped(&mut out, &metadata.genre);
	out.push_str("</upnp:genre>");

	write_res(&mut out, uri, metadata, bit_depth, channels, sample_rate);

	out.push_str("<upnp:class>object.item.audioItem.musicTrack</upnp:class></item></DIDL-Lite>");
	out
}

fn write_res(out: &mut String, uri: &str, metadata: &Metadata, bit_depth: u32, channels: u32, sample_rate: u32) {
	out.push_str("<res");

	out.push_str(" duration=\"");
	out.push_str(&duration_string(metadata.duration_ms));
	out.push('"');

	out.push_str(" protocolInfo=\"Airplay:*:audio/L16:*\"");

	if bit_depth != 0 {
		let _ = write!(out, " bitsPerSample=\"{bit_depth}\"");
	}
	if sample_rate != 0 {
		let _ = write!(out, " sampleFrequency=\"{sample_rate}\"");
	}
	if channels != 0 {
		let _ = write!(out, " nrAudioChannels=\"{channels}\"");
	}
	if bit_depth != 0 && channels != 0 && sample_rate != 0 {
		let byte_depth = u64::from(bit_depth / 8);
		let total_bytes =
			byte_depth * u64::from(sample_rate) * u64::from(channels) * u64::from(metadata.duration_ms) / 1000;
		let _ = write!(out, " size=\"{total_bytes}\"");
	}

	out.push('>');
	// The URI is a literal, not escapable text content.
	out.push_str(uri);
	out.push_str("</res>");
}

/// Formats `duration_ms` as `HH:MM:SS[.ms/1000]`, hours zero-padded to at
/// least two digits. The fractional suffix is omitted when the millisecond
/// remainder is zero.
///
/// # Panics
/// - if the computed hours exceed 99, minutes exceed 59, or seconds exceed
///   60 — 60 (not 59) is accepted as a boundary case, since tick-boundary
///   timing can legitimately round up to a full minute before carrying.
#[must_use]
pub fn duration_string(duration_ms: u32) -> String {
	const MS_PER_SECOND: u32 = 1000;
	const MS_PER_MINUTE: u32 = MS_PER_SECOND * 60;
	const MS_PER_HOUR: u32 = MS_PER_MINUTE * 60;

	let mut remaining = duration_ms;
	let hours = duration_ms / MS_PER_HOUR;
	remaining -= hours * MS_PER_HOUR;

	let minutes = remaining / MS_PER_MINUTE;
	remaining -= minutes * MS_PER_MINUTE;

	let seconds = remaining / MS_PER_SECOND;
	remaining -= seconds * MS_PER_SECOND;

	let milliseconds = remaining;

	assert!(hours <= 99, "duration hours out of range: {hours}");
	assert!(minutes <= 59, "duration minutes out of range: {minutes}");
	assert!(seconds <= 60, "duration seconds out of range: {seconds}");

	let mut out = String::with_capacity(12);
	let _ = write!(out, "{hours:02}:{minutes:02}:{seconds:02}");
	if milliseconds > 0 {
		let _ = write!(out, ".{milliseconds}/{MS_PER_SECOND}");
	}
	out
}

fn write_escaped(out: &mut String, text: &str) {
	for ch in text.chars() {
		match ch {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&apos;"),
			_ => out.push(ch),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn duration_string_omits_fraction_when_zero() {
		assert_eq!(duration_string(0), "00:00:00");
	}

	#[test]
	fn duration_string_carries_hours_minutes_seconds() {
		assert_eq!(duration_string(3_600_000 + 61_000), "01:01:01");
	}

	#[test]
	fn duration_string_includes_fraction_when_nonzero() {
		assert_eq!(duration_string(5_250), "00:00:05.250/1000");
	}

	#[test]
	#[should_panic(expected = "hours out of range")]
	fn duration_string_rejects_hours_over_99() {
		duration_string(100 * 3_600_000);
	}

	#[test]
	fn escapes_reserved_xml_characters_in_text_but_not_uri() {
		let metadata = Metadata {
			track: "Rock & Roll <live>".to_string(),
			artist: "\"Quoted\" 'Artist'".to_string(),
			album: String::new(),
			genre: String::new(),
			duration_ms: 5000,
		};
		let xml = write("http://host/a&b", &metadata, 16, 2, 44_100);
		assert!(xml.contains("<dc:title>Rock &amp; Roll &lt;live&gt;</dc:title>"));
		assert!(xml.contains("<upnp:artist>&quot;Quoted&quot; &apos;Artist&apos;</upnp:artist>"));
		assert!(xml.contains("<res"));
		assert!(xml.contains(">http://host/a&b</res>"));
		assert!(xml.contains("duration=\"00:00:05\""));
		assert!(xml.contains("protocolInfo=\"Airplay:*:audio/L16:*\""));
		assert!(xml.contains("bitsPerSample=\"16\""));
		assert!(xml.contains("sampleFrequency=\"44100\""));
		assert!(xml.contains("nrAudioChannels=\"2\""));
	}

	#[test]
	fn size_attribute_present_only_when_all_three_format_fields_are_nonzero() {
		let metadata = Metadata {
			duration_ms: 1000,
			..Metadata::default()
		};
		let with_format = write("u", &metadata, 16, 2, 44_100);
		assert!(with_format.contains("size=\""));

		let without_format = write("u", &metadata, 0, 2, 44_100);
		assert!(!without_format.contains("size=\""));
	}
}
