/// Training loop driving a learning rate schedule over parameter groups
use std::path::PathBuf;

use super::checkpoint::ResumeMetadata;
use super::param_groups::ParamGroups;
use super::scheduler::{LrSchedule, WarmupScheduler};
use crate::config::ScheduleConfig;
use crate::{Result, ScheduleError};

/// Parameter groups paired with the schedule that sets their rates
pub struct ScheduledOptimizer<G, S> {
    groups: G,
    schedule: S,
}

impl<G: ParamGroups, S: LrSchedule> ScheduledOptimizer<G, S> {
    pub fn new(groups: G, schedule: S) -> Self {
        Self { groups, schedule }
    }

    /// Advance the schedule by one step and write the new rates into the groups
    ///
    /// Call exactly once per optimizer step, before the update.
    pub fn apply_schedule(&mut self) -> Result<Vec<f64>> {
        let rates = self.schedule.compute_rate();
        if rates.len() != self.groups.num_groups() {
            return Err(ScheduleError::Training(format!(
                "schedule produced {} rates for {} parameter groups",
                rates.len(),
                self.groups.num_groups()
            )));
        }

        for (group, lr) in rates.iter().enumerate() {
            self.groups.set_learning_rate(group, *lr)?;
        }

        log::debug!(
            "Step {}: lr={:?}",
            self.schedule.global_step(),
            rates
        );

        Ok(rates)
    }

    pub fn global_step(&self) -> usize {
        self.schedule.global_step()
    }

    /// Rates currently held by the groups
    pub fn current_rates(&self) -> Result<Vec<f64>> {
        self.groups.learning_rates()
    }

    pub fn groups(&self) -> &G {
        &self.groups
    }

    pub fn groups_mut(&mut self) -> &mut G {
        &mut self.groups
    }

    pub fn schedule(&self) -> &S {
        &self.schedule
    }

    pub fn schedule_mut(&mut self) -> &mut S {
        &mut self.schedule
    }

    pub fn into_parts(self) -> (G, S) {
        (self.groups, self.schedule)
    }

    /// Metadata describing the current position, for the caller's checkpoint
    pub fn resume_metadata(&self, epoch: usize, steps_per_epoch: usize) -> Result<ResumeMetadata> {
        Ok(ResumeMetadata {
            epoch,
            steps_per_epoch,
            step: self.schedule.global_step(),
            lr: self.current_rates()?,
        })
    }
}

/// Training configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub num_epochs: usize,
    /// Optimizer steps per epoch
    pub steps_per_epoch: usize,
    /// Log loss and learning rate every N steps
    pub log_every: usize,
    /// Learning rate schedule
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Where to write resume metadata after each epoch
    #[serde(default)]
    pub metadata_path: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            num_epochs: 10,
            steps_per_epoch: 1000,
            log_every: 100,
            schedule: ScheduleConfig::default(),
            metadata_path: None,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.steps_per_epoch == 0 {
            return Err(ScheduleError::Config(
                "steps_per_epoch must be > 0".to_string(),
            ));
        }
        if self.log_every == 0 {
            return Err(ScheduleError::Config("log_every must be > 0".to_string()));
        }
        self.schedule.validate()
    }
}

/// Epoch-based training loop with a warmup schedule
///
/// The model and data live in the caller's step closure; the trainer owns
/// the position in training and keeps the learning rate in step with it.
pub struct Trainer<G: ParamGroups> {
    host: ScheduledOptimizer<G, WarmupScheduler>,
    config: TrainingConfig,
    epoch: usize,
}

impl<G: ParamGroups> Trainer<G> {
    /// Create new trainer, taking base rates from the parameter groups
    pub fn new(groups: G, config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        let scheduler = WarmupScheduler::from_config(&config.schedule, groups.base_rates())?;
        log::info!("Created {} for {} parameter groups", scheduler, groups.num_groups());

        Ok(Self {
            host: ScheduledOptimizer::new(groups, scheduler),
            config,
            epoch: 0,
        })
    }

    /// Continue from a previous run
    ///
    /// Completed epochs are skipped and the schedule jumps to the first
    /// step of the next epoch on the following training step.
    pub fn resume(&mut self, metadata: &ResumeMetadata) -> Result<()> {
        if metadata.steps_per_epoch != self.config.steps_per_epoch {
            log::warn!(
                "Checkpoint used {} steps/epoch, current config uses {}",
                metadata.steps_per_epoch,
                self.config.steps_per_epoch
            );
        }
        if metadata.epoch > self.config.num_epochs {
            return Err(ScheduleError::Training(format!(
                "checkpoint epoch {} is past the configured {} epochs",
                metadata.epoch, self.config.num_epochs
            )));
        }

        self.host.schedule_mut().resume_from(metadata.position())?;
        self.epoch = metadata.epoch;
        log::info!("Resuming from epoch {}", metadata.epoch);
        Ok(())
    }

    /// Run one optimizer step
    ///
    /// The scheduled rates are written into the groups before `step_fn` runs.
    pub fn train_step<F>(&mut self, step_fn: F) -> Result<f32>
    where
        F: FnOnce(&mut G) -> Result<f32>,
    {
        self.host.apply_schedule()?;
        step_fn(self.host.groups_mut())
    }

    /// Train for one epoch, returning the average loss
    pub fn train_epoch<F>(&mut self, step_fn: &mut F) -> Result<f32>
    where
        F: FnMut(&mut G, usize) -> Result<f32>,
    {
        let mut total_loss = 0.0;

        for batch in 0..self.config.steps_per_epoch {
            let loss = self.train_step(|groups| step_fn(groups, batch))?;
            total_loss += loss;

            let step = self.host.global_step();
            if step % self.config.log_every == 0 {
                log::info!(
                    "Step {}: loss={:.4}, lr={:?}",
                    step,
                    loss,
                    self.host.current_rates()?
                );
            }
        }

        Ok(total_loss / self.config.steps_per_epoch as f32)
    }

    /// Full training loop, returning the average loss of every epoch run
    pub fn train<F>(&mut self, mut step_fn: F) -> Result<Vec<f32>>
    where
        F: FnMut(&mut G, usize) -> Result<f32>,
    {
        log::info!(
            "Starting training at epoch {} of {}",
            self.epoch + 1,
            self.config.num_epochs
        );

        let mut epoch_losses = Vec::new();
        while self.epoch < self.config.num_epochs {
            log::info!("=== Epoch {}/{} ===", self.epoch + 1, self.config.num_epochs);

            let avg_loss = self.train_epoch(&mut step_fn)?;
            epoch_losses.push(avg_loss);
            self.epoch += 1;

            log::info!(
                "Epoch {} complete: avg_loss={:.4}, step={}",
                self.epoch,
                avg_loss,
                self.host.global_step()
            );

            if let Some(path) = &self.config.metadata_path {
                self.resume_metadata()?.save(path)?;
            }
        }

        log::info!("Training complete!");
        Ok(epoch_losses)
    }

    /// Metadata for the current position
    pub fn resume_metadata(&self) -> Result<ResumeMetadata> {
        self.host.resume_metadata(self.epoch, self.config.steps_per_epoch)
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn global_step(&self) -> usize {
        self.host.global_step()
    }

    pub fn host(&self) -> &ScheduledOptimizer<G, WarmupScheduler> {
        &self.host
    }

    pub fn into_groups(self) -> G {
        self.host.into_parts().0
    }
}
