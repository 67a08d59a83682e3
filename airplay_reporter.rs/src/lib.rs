pub mod didl;
pub mod reporter;
pub mod start_offset;

pub use reporter::{AirplayReporter, AirplayReporterConfig};
pub use start_offset::StartOffset;
