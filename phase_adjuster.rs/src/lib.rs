mod adjuster;
mod config;
mod state;

pub use adjuster::PhaseAdjuster;
pub use config::PhaseAdjusterConfig;
