/// Resume metadata written next to training checkpoints
use std::path::Path;

use super::scheduler::ResumePosition;

/// Position and schedule state recorded when a checkpoint is taken
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResumeMetadata {
    /// Completed epochs
    pub epoch: usize,
    /// Optimizer steps per epoch
    pub steps_per_epoch: usize,
    /// Schedule step counter at checkpoint time
    pub step: usize,
    /// Per-group learning rates at checkpoint time
    #[serde(default)]
    pub lr: Vec<f64>,
}

impl ResumeMetadata {
    /// Position the schedule should jump to when training restarts
    pub fn position(&self) -> ResumePosition {
        ResumePosition::new(self.epoch, self.steps_per_epoch)
    }

    /// Save metadata as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path.as_ref(), json.as_bytes())?;
        log::debug!("Wrote resume metadata to {}", path.as_ref().display());
        Ok(())
    }

    /// Load metadata from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        let metadata: Self = serde_json::from_slice(&data)?;

        let boundary = metadata.position().step()? - 1;
        if metadata.step != boundary {
            log::warn!(
                "Resume metadata step {} does not match epoch {} x {} steps/epoch; resuming from the epoch boundary",
                metadata.step,
                metadata.epoch,
                metadata.steps_per_epoch
            );
        }

        Ok(metadata)
    }
}
