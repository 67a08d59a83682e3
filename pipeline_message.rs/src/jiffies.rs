use derive_more::derive::{Add, AddAssign, Display, From, Sub, SubAssign};

/// The pipeline's rational time unit: ticks per second, chosen so that every
/// sample rate in common use (44100, 48000, 88200, 96000, 176400, 192000, ...)
/// divides it exactly.
pub const JIFFIES_PER_SECOND: u64 = 56_448_000_000;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("sample rate {0} does not divide JIFFIES_PER_SECOND exactly")]
pub struct SampleRateError(pub u32);

/// Number of jiffies a single sample occupies at `sample_rate`.
///
/// # Panics
/// - if `sample_rate` does not divide [`JIFFIES_PER_SECOND`] exactly. This is
///   a construction-time programmer error, not a stream-time condition: every
///   sample rate an upstream decoder can legally report divides evenly.
#[must_use]
pub fn jiffies_per_sample(sample_rate: u32) -> u64 {
	debug_assert_eq!(
		JIFFIES_PER_SECOND % u64::from(sample_rate),
		0,
		"sample rate {sample_rate} does not divide JIFFIES_PER_SECOND exactly"
	);
	JIFFIES_PER_SECOND / u64::from(sample_rate)
}

/// Fallible counterpart of [`jiffies_per_sample`] for callers at a boundary
/// (e.g. validating a `DecodedStream` sample rate supplied from outside this
/// crate) that would rather report an error than panic.
///
/// # Errors
/// [`SampleRateError`] if `sample_rate` does not divide [`JIFFIES_PER_SECOND`] exactly.
pub fn jiffies_per_sample_checked(sample_rate: u32) -> Result<u64, SampleRateError> {
	if sample_rate == 0 || JIFFIES_PER_SECOND % u64::from(sample_rate) != 0 {
		return Err(SampleRateError(sample_rate));
	}
	Ok(JIFFIES_PER_SECOND / u64::from(sample_rate))
}

#[must_use]
pub fn samples_in_jiffies(jiffies: u64, sample_rate: u32) -> u64 {
	jiffies / jiffies_per_sample(sample_rate)
}

#[derive(
	Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Add, AddAssign, Sub, SubAssign, From, Display,
)]
pub struct Jiffies(pub u64);

impl Jiffies {
	#[must_use]
	pub const fn new(jiffies: u64) -> Self {
		Self(jiffies)
	}

	#[must_use]
	pub const fn inner(self) -> u64 {
		self.0
	}

	#[must_use]
	pub fn to_ms(self) -> u64 {
		self.0 * 1000 / JIFFIES_PER_SECOND
	}

	#[must_use]
	pub fn saturating_sub(self, rhs: Self) -> Self {
		Self(self.0.saturating_sub(rhs.0))
	}
}
