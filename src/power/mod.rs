/// Power and energy measurement for accelerator training runs
pub mod sampler;

pub use sampler::{measure, PowerSampler, PowerTrace, SamplerConfig};

/// A source of per-device power readings
///
/// Readings are reported as strings such as `"123.45W"`, or `"N/A"` when a
/// device cannot report.
pub trait PowerSource: Send + 'static {
    /// Number of devices the source reports on
    fn num_devices(&self) -> usize;

    /// One reading per device, in device order
    fn read_all(&mut self) -> Vec<String>;
}

/// Parse a power reading in watts
///
/// The trailing unit character is dropped; anything that does not parse
/// reads as zero.
pub fn parse_power(reading: &str) -> f64 {
    let reading = reading.trim();
    let mut chars = reading.chars();
    chars.next_back();
    chars.as_str().trim().parse::<f64>().unwrap_or(0.0)
}
