use derive_more::derive::Display;

/// Gain envelope applied to a prefix of PCM samples. `MIN` is silence, `MAX`
/// is unity gain; values in between are implementation-defined steps of an
/// upward (or downward) ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub struct RampValue(u32);

impl RampValue {
	pub const MIN: Self = Self(0);
	pub const MAX: Self = Self(u32::MAX);

	#[must_use]
	pub const fn new(value: u32) -> Self {
		Self(value)
	}

	#[must_use]
	pub const fn inner(self) -> u32 {
		self.0
	}

	#[must_use]
	pub const fn is_min(self) -> bool {
		self.0 == Self::MIN.0
	}

	#[must_use]
	pub const fn is_max(self) -> bool {
		self.0 == Self::MAX.0
	}

	/// Steps this ramp value `fraction_done` of the way from `MIN` to `MAX`,
	/// where `fraction_done = elapsed / total` (both in the same unit, e.g. jiffies).
	#[must_use]
	pub fn step_up(elapsed: u64, total: u64) -> Self {
		if total == 0 {
			return Self::MAX;
		}
		let elapsed = elapsed.min(total);
		let value = (u128::from(u32::MAX) * u128::from(elapsed) / u128::from(total)) as u32;
		Self(value)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RampDirection {
	Up,
	Down,
}
