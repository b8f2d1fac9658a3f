/// Parameter groups that receive scheduled learning rates
use candle_core::Tensor;
use candle_nn::Optimizer;

use crate::{Result, ScheduleError};

/// An optimizer-like collection of parameter groups
///
/// Each group has a fixed base rate and a mutable current rate.
pub trait ParamGroups {
    /// Number of parameter groups
    fn num_groups(&self) -> usize;

    /// Base learning rate of every group, in group order
    fn base_rates(&self) -> Vec<f64>;

    /// Current learning rate of a group
    fn learning_rate(&self, group: usize) -> Result<f64>;

    /// Overwrite the current learning rate of a group
    fn set_learning_rate(&mut self, group: usize, lr: f64) -> Result<()>;

    /// Current learning rate of every group
    fn learning_rates(&self) -> Result<Vec<f64>> {
        (0..self.num_groups()).map(|g| self.learning_rate(g)).collect()
    }
}

fn out_of_range(group: usize, len: usize) -> ScheduleError {
    ScheduleError::Training(format!(
        "parameter group {} out of range ({} groups)",
        group, len
    ))
}

/// A single parameter group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamGroup {
    /// Learning rate the group was configured with
    pub base_lr: f64,
    /// Learning rate in effect for the next update
    pub lr: f64,
}

impl ParamGroup {
    pub fn new(base_lr: f64) -> Self {
        Self { base_lr, lr: base_lr }
    }
}

/// Plain parameter groups without attached tensors
#[derive(Debug, Clone, Default)]
pub struct GroupedRates {
    groups: Vec<ParamGroup>,
}

impl GroupedRates {
    pub fn new(base_rates: &[f64]) -> Self {
        Self {
            groups: base_rates.iter().copied().map(ParamGroup::new).collect(),
        }
    }

    pub fn groups(&self) -> &[ParamGroup] {
        &self.groups
    }
}

impl ParamGroups for GroupedRates {
    fn num_groups(&self) -> usize {
        self.groups.len()
    }

    fn base_rates(&self) -> Vec<f64> {
        self.groups.iter().map(|g| g.base_lr).collect()
    }

    fn learning_rate(&self, group: usize) -> Result<f64> {
        self.groups
            .get(group)
            .map(|g| g.lr)
            .ok_or_else(|| out_of_range(group, self.groups.len()))
    }

    fn set_learning_rate(&mut self, group: usize, lr: f64) -> Result<()> {
        let len = self.groups.len();
        let entry = self.groups.get_mut(group).ok_or_else(|| out_of_range(group, len))?;
        entry.lr = lr;
        Ok(())
    }
}

/// candle optimizers treated as parameter groups, one optimizer per group
///
/// The base rate of each group is the optimizer's learning rate at the time
/// it was added.
pub struct CandleGroups<O: Optimizer> {
    optimizers: Vec<O>,
    base_rates: Vec<f64>,
}

impl<O: Optimizer> CandleGroups<O> {
    /// Wrap a single optimizer as one group
    pub fn single(optimizer: O) -> Self {
        Self::new(vec![optimizer])
    }

    pub fn new(optimizers: Vec<O>) -> Self {
        let base_rates = optimizers.iter().map(|o| o.learning_rate()).collect();
        Self {
            optimizers,
            base_rates,
        }
    }

    /// Compute gradients once and update every group
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        let grads = loss.backward()?;
        for optimizer in self.optimizers.iter_mut() {
            optimizer.step(&grads)?;
        }
        Ok(())
    }

    pub fn optimizers(&self) -> &[O] {
        &self.optimizers
    }

    pub fn into_inner(self) -> Vec<O> {
        self.optimizers
    }
}

impl<O: Optimizer> ParamGroups for CandleGroups<O> {
    fn num_groups(&self) -> usize {
        self.optimizers.len()
    }

    fn base_rates(&self) -> Vec<f64> {
        self.base_rates.clone()
    }

    fn learning_rate(&self, group: usize) -> Result<f64> {
        self.optimizers
            .get(group)
            .map(|o| o.learning_rate())
            .ok_or_else(|| out_of_range(group, self.optimizers.len()))
    }

    fn set_learning_rate(&mut self, group: usize, lr: f64) -> Result<()> {
        let len = self.optimizers.len();
        let optimizer = self
            .optimizers
            .get_mut(group)
            .ok_or_else(|| out_of_range(group, len))?;
        optimizer.set_learning_rate(lr);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, Var};
    use candle_nn::SGD;

    #[test]
    fn test_grouped_rates() {
        let mut groups = GroupedRates::new(&[1e-3, 2e-3]);
        assert_eq!(groups.num_groups(), 2);
        assert_eq!(groups.base_rates(), vec![1e-3, 2e-3]);

        groups.set_learning_rate(1, 5e-4).unwrap();
        assert_eq!(groups.learning_rates().unwrap(), vec![1e-3, 5e-4]);
        assert_eq!(groups.groups()[1].base_lr, 2e-3);
    }

    #[test]
    fn test_out_of_range_group() {
        let mut groups = GroupedRates::new(&[1e-3]);
        assert!(matches!(
            groups.set_learning_rate(3, 0.1),
            Err(ScheduleError::Training(_))
        ));
        assert!(groups.learning_rate(1).is_err());
    }

    #[test]
    fn test_candle_groups_set_lr() -> Result<()> {
        let device = Device::Cpu;
        let w = Var::zeros(4, DType::F32, &device)?;
        let sgd = SGD::new(vec![w], 0.1)?;

        let mut groups = CandleGroups::single(sgd);
        assert_eq!(groups.base_rates(), vec![0.1]);

        groups.set_learning_rate(0, 0.01)?;
        assert!((groups.learning_rate(0)? - 0.01).abs() < 1e-12);
        // Base rate is captured once
        assert_eq!(groups.base_rates(), vec![0.1]);
        Ok(())
    }

    #[test]
    fn test_candle_backward_step_updates_vars() -> Result<()> {
        let device = Device::Cpu;
        let w = Var::new(&[1.0f32, 2.0], &device)?;
        let sgd = SGD::new(vec![w.clone()], 0.5)?;
        let mut groups = CandleGroups::single(sgd);

        // d(sum(w^2))/dw = 2w, so w <- w - 0.5 * 2w = 0
        let loss = w.as_tensor().sqr()?.sum_all()?;
        groups.backward_step(&loss)?;

        let updated = w.as_tensor().to_vec1::<f32>()?;
        assert!(updated.iter().all(|v| v.abs() < 1e-6));
        Ok(())
    }
}
