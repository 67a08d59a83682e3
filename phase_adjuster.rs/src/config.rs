use pipeline_message::JIFFIES_PER_SECOND;

/// Tunables for the phase-alignment state machine, fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct PhaseAdjusterConfig {
	/// Below this many jiffies of reported phase delay, drift is considered
	/// noise and no adjustment is made.
	pub min_delay_jiffies: u32,
	/// Ramp length, in jiffies, used when the active `Mode` requests the long
	/// pause/resume ramp (`ModeInfo::ramp_pause_resume_long`).
	pub ramp_jiffies_long: u32,
	/// Ramp length, in jiffies, used otherwise.
	pub ramp_jiffies_short: u32,
}

impl Default for PhaseAdjusterConfig {
	fn default() -> Self {
		Self {
			min_delay_jiffies: (JIFFIES_PER_SECOND * 5 / 1000) as u32,
			ramp_jiffies_long: (JIFFIES_PER_SECOND / 10) as u32,
			ramp_jiffies_short: (JIFFIES_PER_SECOND / 50) as u32,
		}
	}
}
