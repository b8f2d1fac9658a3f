/// Configuration for the warmup learning-rate schedule
///
/// `scale_exponent` corresponds to the model dimension term of the
/// conformer recipe (`adim`); the schedule scales every rate by its
/// inverse square root.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScheduleConfig {
    /// Number of steps spent ramping up to the base rate
    #[serde(default = "default_warmup_steps")]
    pub warmup_steps: usize,

    /// Model-size scaling factor, raised to the power -0.5
    #[serde(default = "default_scale_exponent")]
    pub scale_exponent: f64,
}

/// Warmup length used when none is configured
pub const DEFAULT_WARMUP_STEPS: usize = 25_000;

fn default_warmup_steps() -> usize {
    DEFAULT_WARMUP_STEPS
}

fn default_scale_exponent() -> f64 {
    1.0
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            warmup_steps: default_warmup_steps(),
            scale_exponent: default_scale_exponent(),
        }
    }
}

impl ScheduleConfig {
    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.warmup_steps == 0 {
            return Err(crate::ScheduleError::Config(
                "warmup_steps must be > 0".to_string(),
            ));
        }

        if !self.scale_exponent.is_finite() || self.scale_exponent <= 0.0 {
            return Err(crate::ScheduleError::Config(format!(
                "scale_exponent must be a finite value > 0, got {}",
                self.scale_exponent
            )));
        }

        Ok(())
    }

    /// Validate a set of base rates against this configuration
    pub fn validate_base_rates(&self, base_rates: &[f64]) -> crate::Result<()> {
        if let Some((idx, rate)) = base_rates
            .iter()
            .enumerate()
            .find(|(_, r)| !r.is_finite() || **r < 0.0)
        {
            return Err(crate::ScheduleError::Config(format!(
                "base rate for group {} must be finite and >= 0, got {}",
                idx, rate
            )));
        }

        Ok(())
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ScheduleConfig::default();
        assert_eq!(config.warmup_steps, 25_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_warmup() {
        let config = ScheduleConfig {
            warmup_steps: 0,
            scale_exponent: 1.0,
        };
        assert!(matches!(
            config.validate(),
            Err(crate::ScheduleError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_non_positive_scale() {
        for scale in [0.0, -4.0, f64::NAN, f64::INFINITY] {
            let config = ScheduleConfig {
                warmup_steps: 10,
                scale_exponent: scale,
            };
            assert!(config.validate().is_err(), "scale {} accepted", scale);
        }
    }

    #[test]
    fn test_rejects_negative_base_rate() {
        let config = ScheduleConfig::default();
        assert!(config.validate_base_rates(&[1e-3, 0.0]).is_ok());
        assert!(config.validate_base_rates(&[1e-3, -1e-3]).is_err());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = ScheduleConfig::from_json(r#"{"scale_exponent": 256.0}"#).unwrap();
        assert_eq!(config.warmup_steps, DEFAULT_WARMUP_STEPS);
        assert_eq!(config.scale_exponent, 256.0);

        assert!(ScheduleConfig::from_json(r#"{"warmup_steps": 0}"#).is_err());
    }
}
