/// Print the warmup schedule around the warmup boundary
use warmup_schedule::training::{ResumePosition, WarmupScheduler};
use warmup_schedule::utils::init_logging;

fn main() -> anyhow::Result<()> {
    init_logging();

    // Default conformer warmup length
    let warmup_steps = 25_000;
    let mut scheduler = WarmupScheduler::new(vec![5e-3], 1.0, warmup_steps)?;
    log::info!("{}", scheduler);

    for step in [1, 1_000, 10_000, 24_999, 25_000, 25_001, 50_000, 100_000, 400_000] {
        log::info!("step {:>7}: lr={:.6e}", step, scheduler.rate_at(step)[0]);
    }

    // Jump to the start of epoch 40 with 1250 steps per epoch
    scheduler.resume_from(ResumePosition::new(40, 1_250))?;
    let lr = scheduler.compute_rate()[0];
    log::info!(
        "resumed at step {}: lr={:.6e}",
        scheduler.global_step(),
        lr
    );

    let lr = scheduler.compute_rate()[0];
    log::info!("next step {}: lr={:.6e}", scheduler.global_step(), lr);

    Ok(())
}
