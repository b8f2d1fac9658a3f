/// Fit a linear model with SGD under the warmup schedule, sampling power on the side
use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{Optimizer, SGD};
use warmup_schedule::power::{measure, PowerSource, SamplerConfig};
use warmup_schedule::training::{CandleGroups, ResumeMetadata, Trainer, TrainingConfig};
use warmup_schedule::utils::init_logging;
use warmup_schedule::ScheduleConfig;

/// Stand-in for a device power query
struct SteadySource;

impl PowerSource for SteadySource {
    fn num_devices(&self) -> usize {
        1
    }

    fn read_all(&mut self) -> Vec<String> {
        vec!["150.00W".to_string()]
    }
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let device = Device::Cpu;

    // y = 3x - 1
    let xs = Tensor::arange(0u32, 64, &device)?.to_dtype(DType::F32)?.affine(1.0 / 64.0, 0.0)?;
    let ys = xs.affine(3.0, -1.0)?;

    let w = Var::zeros(1, DType::F32, &device)?;
    let b = Var::zeros(1, DType::F32, &device)?;
    let sgd = SGD::new(vec![w.clone(), b.clone()], 0.5)?;

    let config = TrainingConfig {
        num_epochs: 5,
        steps_per_epoch: 40,
        log_every: 50,
        schedule: ScheduleConfig {
            warmup_steps: 40,
            scale_exponent: 1.0,
        },
        metadata_path: Some(std::env::temp_dir().join("warmup_schedule_demo.json")),
    };

    let mut trainer = Trainer::new(CandleGroups::single(sgd), config.clone())?;

    let (losses, trace) = measure(SteadySource, SamplerConfig::default(), || {
        trainer.train(|groups, _| {
            let pred = xs.broadcast_mul(w.as_tensor())?.broadcast_add(b.as_tensor())?;
            let loss = (pred - &ys)?.sqr()?.mean_all()?;
            let value = loss.to_scalar::<f32>()?;
            groups.backward_step(&loss)?;
            Ok(value)
        })
    })?;
    let losses = losses?;

    log::info!("Epoch losses: {:?}", losses);
    log::info!(
        "w={:.4}, b={:.4}",
        w.as_tensor().to_vec1::<f32>()?[0],
        b.as_tensor().to_vec1::<f32>()?[0]
    );
    log::info!(
        "Sampled {} power readings, energy={:?} Wh",
        trace.len(),
        trace.energy()
    );

    if let Some(path) = &config.metadata_path {
        let metadata = ResumeMetadata::load(path)?;
        log::info!(
            "Next run resumes at step {} (lr {:?})",
            metadata.position().step()?,
            metadata.lr
        );
        let final_lr = trainer.host().groups().optimizers()[0].learning_rate();
        log::info!("Final optimizer lr: {:.6}", final_lr);
        std::fs::remove_file(path).ok();
    }

    Ok(())
}
