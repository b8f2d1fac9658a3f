/// Inverse-square-root learning rate scheduler with linear warmup
use crate::config::{ScheduleConfig, DEFAULT_WARMUP_STEPS};

/// A learning rate schedule driven once per optimizer step
pub trait LrSchedule {
    /// Advance the schedule by one step and return one rate per parameter group
    fn compute_rate(&mut self) -> Vec<f64>;

    /// Number of steps consumed so far
    fn global_step(&self) -> usize;
}

/// Position to jump to on the first step after a restore
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResumePosition {
    /// Epoch the checkpoint was taken at
    pub epoch: usize,
    /// Optimizer steps per epoch in the interrupted run
    pub steps_per_epoch: usize,
}

impl ResumePosition {
    pub fn new(epoch: usize, steps_per_epoch: usize) -> Self {
        Self {
            epoch,
            steps_per_epoch,
        }
    }

    /// 1-based step the schedule resolves to when resuming here
    ///
    /// Fails when the position does not fit in a step counter.
    pub fn step(&self) -> crate::Result<usize> {
        self.steps_per_epoch
            .checked_mul(self.epoch)
            .and_then(|s| s.checked_add(1))
            .ok_or_else(|| {
                crate::ScheduleError::Config(format!(
                    "resume position epoch {} x {} steps/epoch overflows the step counter",
                    self.epoch, self.steps_per_epoch
                ))
            })
    }
}

/// Persistable scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct SchedulerState {
    pub step_count: usize,
}

/// Warmup learning rate scheduler
///
/// For each base rate `r` the rate at 1-based step `s` is
///
/// ```text
/// r * warmup^0.5 * scale^-0.5 * min(s^-0.5, s * warmup^-1.5)
/// ```
///
/// The two branches cross at `s == warmup`, where (with `scale == 1`)
/// the rate equals `r`. Before that the rate grows linearly from zero,
/// after it decays with the inverse square root of the step.
#[derive(Debug, Clone)]
pub struct WarmupScheduler {
    warmup_steps: usize,
    scale_exponent: f64,
    base_rates: Vec<f64>,
    step_count: usize,
    resume: Option<(ResumePosition, usize)>,
}

impl WarmupScheduler {
    /// Create new scheduler
    ///
    /// # Arguments
    /// * `base_rates` - One base learning rate per parameter group
    /// * `scale_exponent` - Model-size factor, raised to the power -0.5
    /// * `warmup_steps` - Length of the linear warmup
    pub fn new(
        base_rates: Vec<f64>,
        scale_exponent: f64,
        warmup_steps: usize,
    ) -> crate::Result<Self> {
        let config = ScheduleConfig {
            warmup_steps,
            scale_exponent,
        };
        Self::from_config(&config, base_rates)
    }

    /// Create new scheduler with the default warmup length
    pub fn with_default_warmup(base_rates: Vec<f64>, scale_exponent: f64) -> crate::Result<Self> {
        Self::new(base_rates, scale_exponent, DEFAULT_WARMUP_STEPS)
    }

    /// Create new scheduler from a validated configuration
    pub fn from_config(config: &ScheduleConfig, base_rates: Vec<f64>) -> crate::Result<Self> {
        config.validate()?;
        config.validate_base_rates(&base_rates)?;

        Ok(Self {
            warmup_steps: config.warmup_steps,
            scale_exponent: config.scale_exponent,
            base_rates,
            step_count: 0,
            resume: None,
        })
    }

    /// Multiplier applied to every base rate at a 1-based step
    ///
    /// Step 0 is treated as step 1.
    pub fn multiplier_at(&self, step: usize) -> f64 {
        let step = step.max(1) as f64;
        let warmup = self.warmup_steps as f64;

        let decay = step.powf(-0.5);
        let ramp = step * warmup.powf(-1.5);

        warmup.sqrt() * self.scale_exponent.powf(-0.5) * decay.min(ramp)
    }

    /// Rates for every group at a 1-based step, without touching the counter
    pub fn rate_at(&self, step: usize) -> Vec<f64> {
        let multiplier = self.multiplier_at(step);
        self.base_rates.iter().map(|r| r * multiplier).collect()
    }

    /// Compute the rates for the next step and advance the counter
    ///
    /// A pending resume position overrides the counter for this call only:
    /// the counter is set to the resolved step and later calls continue
    /// counting from there.
    pub fn compute_rate(&mut self) -> Vec<f64> {
        let step = match self.resume.take() {
            Some((position, step)) => {
                log::info!(
                    "Resuming schedule at epoch {} ({} steps/epoch): step {}",
                    position.epoch,
                    position.steps_per_epoch,
                    step
                );
                step
            }
            None => self.step_count + 1,
        };
        self.step_count = step;

        self.rate_at(step)
    }

    /// Arm a one-shot resume for the next `compute_rate` call
    pub fn resume_from(&mut self, position: ResumePosition) -> crate::Result<()> {
        let step = position.step()?;
        self.resume = Some((position, step));
        Ok(())
    }

    /// Whether a resume position is waiting to be consumed
    pub fn is_resuming(&self) -> bool {
        self.resume.is_some()
    }

    /// Current step counter
    pub fn global_step(&self) -> usize {
        self.step_count
    }

    pub fn warmup_steps(&self) -> usize {
        self.warmup_steps
    }

    pub fn scale_exponent(&self) -> f64 {
        self.scale_exponent
    }

    pub fn base_rates(&self) -> &[f64] {
        &self.base_rates
    }

    /// Snapshot of the mutable state
    pub fn state(&self) -> SchedulerState {
        SchedulerState {
            step_count: self.step_count,
        }
    }

    /// Restore a snapshot taken with [`WarmupScheduler::state`]
    pub fn load_state(&mut self, state: SchedulerState) {
        self.step_count = state.step_count;
        self.resume = None;
    }
}

impl LrSchedule for WarmupScheduler {
    fn compute_rate(&mut self) -> Vec<f64> {
        WarmupScheduler::compute_rate(self)
    }

    fn global_step(&self) -> usize {
        self.step_count
    }
}

impl std::fmt::Display for WarmupScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WarmupScheduler(warmup_steps={})", self.warmup_steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::relative_diff;

    fn single(scheduler: &mut WarmupScheduler) -> f64 {
        scheduler.compute_rate()[0]
    }

    #[test]
    fn test_small_warmup_sequence() {
        let mut scheduler = WarmupScheduler::new(vec![2.0], 1.0, 4).unwrap();

        let expected = [0.5, 1.0, 1.5, 2.0, 4.0 / 5f64.sqrt()];
        for (i, want) in expected.iter().enumerate() {
            let lr = single(&mut scheduler);
            assert_eq!(scheduler.global_step(), i + 1);
            assert!((lr - want).abs() < 1e-9, "step {}: {} != {}", i + 1, lr, want);
        }
    }

    #[test]
    fn test_peak_equals_base_rate() {
        let scheduler = WarmupScheduler::new(vec![1e-3, 5e-4], 1.0, 25_000).unwrap();
        let rates = scheduler.rate_at(25_000);
        assert!(relative_diff(rates[0], 1e-3) < 1e-9);
        assert!(relative_diff(rates[1], 5e-4) < 1e-9);
    }

    #[test]
    fn test_scale_exponent_scales_rates() {
        let scheduler = WarmupScheduler::new(vec![1.0], 256.0, 100).unwrap();
        assert!((scheduler.rate_at(100)[0] - 1.0 / 16.0).abs() < 1e-12);
    }

    #[test]
    fn test_warmup_monotonic_increase() {
        let mut scheduler = WarmupScheduler::new(vec![1.0], 1.0, 200).unwrap();
        let mut prev = 0.0;
        for _ in 0..200 {
            let lr = single(&mut scheduler);
            assert!(lr >= prev, "lr decreased during warmup at step {}", scheduler.global_step());
            prev = lr;
        }
    }

    #[test]
    fn test_decay_monotonic_decrease() {
        let mut scheduler = WarmupScheduler::new(vec![1.0], 1.0, 50).unwrap();
        for _ in 0..50 {
            scheduler.compute_rate();
        }
        let mut prev = single(&mut scheduler);
        for _ in 0..500 {
            let lr = single(&mut scheduler);
            assert!(lr <= prev, "lr increased during decay at step {}", scheduler.global_step());
            prev = lr;
        }
    }

    #[test]
    fn test_lr_never_exceeds_base() {
        let scheduler = WarmupScheduler::new(vec![3e-4], 1.0, 1000).unwrap();
        for step in 1..=5000 {
            let lr = scheduler.rate_at(step)[0];
            assert!(lr <= 3e-4 * (1.0 + 1e-9), "lr {} exceeds base at step {}", lr, step);
        }
    }

    #[test]
    fn test_global_step_counts_calls() {
        let mut scheduler = WarmupScheduler::with_default_warmup(vec![1.0], 1.0).unwrap();
        assert_eq!(scheduler.global_step(), 0);
        for _ in 0..37 {
            scheduler.compute_rate();
        }
        assert_eq!(scheduler.global_step(), 37);
    }

    #[test]
    fn test_resume_resolves_step() {
        let mut scheduler = WarmupScheduler::new(vec![1.0], 1.0, 100).unwrap();
        scheduler.resume_from(ResumePosition::new(2, 50)).unwrap();
        assert!(scheduler.is_resuming());

        let lr = single(&mut scheduler);
        assert_eq!(scheduler.global_step(), 101);
        assert!((lr - 10.0 / 101f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_resume_consumed_once() {
        let mut scheduler = WarmupScheduler::new(vec![1.0], 1.0, 100).unwrap();
        for _ in 0..7 {
            scheduler.compute_rate();
        }

        scheduler.resume_from(ResumePosition::new(2, 50)).unwrap();
        scheduler.compute_rate();
        assert!(!scheduler.is_resuming());
        assert_eq!(scheduler.global_step(), 101);

        scheduler.compute_rate();
        scheduler.compute_rate();
        assert_eq!(scheduler.global_step(), 103);
    }

    #[test]
    fn test_resume_at_epoch_zero() {
        let mut scheduler = WarmupScheduler::new(vec![1.0], 1.0, 10).unwrap();
        scheduler.resume_from(ResumePosition::new(0, 1000)).unwrap();
        scheduler.compute_rate();
        assert_eq!(scheduler.global_step(), 1);
    }

    #[test]
    fn test_resume_overflow_rejected() {
        let mut scheduler = WarmupScheduler::new(vec![1.0], 1.0, 10).unwrap();
        for _ in 0..3 {
            scheduler.compute_rate();
        }

        let result = scheduler.resume_from(ResumePosition::new(usize::MAX, 4));
        assert!(matches!(result, Err(crate::ScheduleError::Config(_))));
        assert!(!scheduler.is_resuming());

        scheduler.compute_rate();
        assert_eq!(scheduler.global_step(), 4);

        assert!(ResumePosition::new(usize::MAX, 1).step().is_err());
        assert_eq!(ResumePosition::new(usize::MAX - 1, 1).step().unwrap(), usize::MAX);
    }

    #[test]
    fn test_step_zero_reads_as_step_one() {
        let scheduler = WarmupScheduler::new(vec![2.0], 1.0, 4).unwrap();
        assert_eq!(scheduler.rate_at(0), scheduler.rate_at(1));
        assert!(scheduler.multiplier_at(0) > 0.0);
    }

    #[test]
    fn test_deterministic() {
        let run = || {
            let mut scheduler = WarmupScheduler::new(vec![1e-3, 2e-3], 144.0, 30).unwrap();
            (0..100).map(|_| scheduler.compute_rate()).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_state_roundtrip() {
        let mut scheduler = WarmupScheduler::new(vec![1.0], 1.0, 10).unwrap();
        for _ in 0..12 {
            scheduler.compute_rate();
        }
        let state = scheduler.state();

        let mut restored = WarmupScheduler::new(vec![1.0], 1.0, 10).unwrap();
        restored.load_state(state);
        assert_eq!(restored.compute_rate(), scheduler.compute_rate());
        assert_eq!(restored.global_step(), 13);
    }

    #[test]
    fn test_invalid_construction() {
        assert!(WarmupScheduler::new(vec![1.0], 1.0, 0).is_err());
        assert!(WarmupScheduler::new(vec![1.0], 0.0, 10).is_err());
        assert!(WarmupScheduler::new(vec![-1.0], 1.0, 10).is_err());
    }

    #[test]
    fn test_empty_groups() {
        let mut scheduler = WarmupScheduler::new(Vec::new(), 1.0, 10).unwrap();
        assert!(scheduler.compute_rate().is_empty());
        assert_eq!(scheduler.global_step(), 1);
    }
}
