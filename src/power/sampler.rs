/// Background power sampler
///
/// A worker thread polls a [`PowerSource`] at a fixed interval until it is
/// told to stop, then hands the collected trace back over a channel.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::{parse_power, PowerSource};
use crate::{Result, ScheduleError};

/// Sampler configuration
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SamplerConfig {
    /// Target time between samples in milliseconds
    pub interval_ms: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self { interval_ms: 100 }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(ScheduleError::Config(
                "interval_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Power samples collected over a run
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PowerTrace {
    /// Seconds since the sampler started, one per sample
    pub timestamps: Vec<f64>,
    /// Watts per device, each aligned with `timestamps`
    pub devices: Vec<Vec<f64>>,
}

impl PowerTrace {
    pub fn new(num_devices: usize) -> Self {
        Self {
            timestamps: Vec::new(),
            devices: vec![Vec::new(); num_devices],
        }
    }

    /// Record one sample; missing readings count as zero
    pub fn push(&mut self, timestamp: f64, readings: &[f64]) {
        for (idx, device) in self.devices.iter_mut().enumerate() {
            device.push(readings.get(idx).copied().unwrap_or(0.0));
        }
        self.timestamps.push(timestamp);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Energy per device in watt-hours
    ///
    /// Each sample after the first contributes its power times the time
    /// elapsed since the previous sample.
    pub fn energy(&self) -> Vec<f64> {
        self.devices
            .iter()
            .map(|powers| {
                self.timestamps
                    .windows(2)
                    .zip(powers.iter().skip(1))
                    .map(|(t, p)| p * (t[1] - t[0]) / 3600.0)
                    .sum()
            })
            .collect()
    }

    /// Mean power per device in watts
    pub fn mean_power(&self) -> Vec<f64> {
        self.devices
            .iter()
            .map(|powers| {
                if powers.is_empty() {
                    0.0
                } else {
                    powers.iter().sum::<f64>() / powers.len() as f64
                }
            })
            .collect()
    }
}

/// Running power sampler
///
/// Call [`PowerSampler::stop`] to collect the trace. Dropping a running
/// sampler stops the worker and discards its trace.
pub struct PowerSampler {
    stop: Arc<AtomicBool>,
    receiver: mpsc::Receiver<PowerTrace>,
    handle: Option<JoinHandle<()>>,
}

impl PowerSampler {
    /// Spawn the sampling worker
    pub fn start<S: PowerSource>(source: S, config: SamplerConfig) -> Result<Self> {
        config.validate()?;

        let stop = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = mpsc::channel();

        let interval = config.interval();
        let worker_stop = stop.clone();
        let handle = std::thread::Builder::new()
            .name("power-sampler".to_string())
            .spawn(move || {
                let trace = sample_loop(source, &worker_stop, interval);
                // Receiver is gone when the sampler was dropped
                sender.send(trace).ok();
            })?;

        log::debug!("Power sampler started ({:?} interval)", interval);

        Ok(Self {
            stop,
            receiver,
            handle: Some(handle),
        })
    }

    /// Signal the worker to stop and return everything it collected
    pub fn stop(mut self) -> Result<PowerTrace> {
        self.stop.store(true, Ordering::SeqCst);

        let trace = self
            .receiver
            .recv()
            .map_err(|_| ScheduleError::Sampler("sampler worker exited without a trace".to_string()))?;

        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| ScheduleError::Sampler("sampler worker panicked".to_string()))?;
        }

        log::debug!("Power sampler stopped after {} samples", trace.len());
        Ok(trace)
    }
}

impl Drop for PowerSampler {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Power sampler worker panicked");
            }
        }
    }
}

fn sample_loop<S: PowerSource>(mut source: S, stop: &AtomicBool, interval: Duration) -> PowerTrace {
    let num_devices = source.num_devices();
    let mut trace = PowerTrace::new(num_devices);

    let start = Instant::now();
    let mut last = start;

    while !stop.load(Ordering::SeqCst) {
        let readings: Vec<f64> = source.read_all().iter().map(|r| parse_power(r)).collect();
        if readings.len() != num_devices {
            log::trace!("Got {} readings for {} devices", readings.len(), num_devices);
        }

        let now = Instant::now();
        trace.push(now.duration_since(start).as_secs_f64(), &readings);

        let wait = interval.saturating_sub(now.duration_since(last));
        std::thread::sleep(wait);
        last = now;
    }

    trace
}

/// Sample power while `f` runs
pub fn measure<S, F, T>(source: S, config: SamplerConfig, f: F) -> Result<(T, PowerTrace)>
where
    S: PowerSource,
    F: FnOnce() -> T,
{
    let sampler = PowerSampler::start(source, config)?;
    let output = f();
    let trace = sampler.stop()?;
    Ok((output, trace))
}
