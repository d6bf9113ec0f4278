use std::sync::Arc;

use grenverk_config::GrenverkConfig;
use grenverk_core::sync::SharedIndex;
use grenverk_core::time::{MsecClock, TimerDelay, TimerId, Timers};
use grenverk_telemetry::metrics::IndexMetrics;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::commands::TimersArgs;

type SharedTimers = Arc<SharedIndex<Timers<usize>>>;

pub async fn run_timer_loop(
    args: TimersArgs,
    config: &GrenverkConfig,
    metrics: &IndexMetrics,
) -> anyhow::Result<()> {
    let clock = if args.realtime {
        MsecClock::monotonic_from(args.start_ms)
    } else {
        MsecClock::manual(args.start_ms)
    };
    let max_delay = args
        .max_delay_ms
        .unwrap_or(config.timers.default_timeout_ms)
        .max(1);

    let timers: SharedTimers = Arc::new(SharedIndex::with_spin(
        Timers::new(clock.clone()),
        config.timers.spin,
    ));
    let ids = arm_timers(&timers, &args, max_delay);
    metrics.timers_added.inc_by(ids.len() as u64);

    let victims: Vec<TimerId> = if args.cancel_every == 0 {
        Vec::new()
    } else {
        ids.iter().copied().step_by(args.cancel_every).collect()
    };
    let canceller = tokio::spawn(cancel_timers(Arc::clone(&timers), victims));

    let mut fired = 0usize;
    loop {
        let delay = timers.lock().find_timer();
        let TimerDelay::After(ms) = delay else {
            break;
        };

        if clock.is_manual() {
            clock.advance(ms);
        } else {
            if let Some(wait) = delay.as_duration() {
                tokio::time::sleep(wait).await;
            }
            clock.update();
        }

        let expired = timers.lock().expire_timers(|event| {
            debug!(event, now = clock.now(), "timer fired");
        });
        fired += expired;
        metrics.timers_expired.inc_by(expired as u64);
        metrics.timers_pending.set(timers.lock().len() as i64);

        if timers.lock().no_timers_left() {
            break;
        }
        tokio::task::yield_now().await;
    }

    let cancelled = canceller.await?;
    let remaining = timers.lock().len();
    metrics.timers_pending.set(remaining as i64);

    info!(fired, cancelled, remaining, "timer loop finished");
    println!("armed {}\tfired {fired}\tcancelled {cancelled}\tcancelable left {remaining}", ids.len());
    Ok(())
}

fn arm_timers(timers: &SharedTimers, args: &TimersArgs, max_delay: u32) -> Vec<TimerId> {
    let mut rng = SmallRng::seed_from_u64(args.seed);
    let mut guard = timers.lock();

    (0..args.count)
        .map(|event| {
            let delay = rng.random_range(1..=max_delay);
            let cancelable = args.cancelable_every != 0 && event % args.cancelable_every == 0;
            if cancelable {
                guard.add_cancelable(event, delay)
            } else {
                guard.add(event, delay)
            }
        })
        .collect()
}

async fn cancel_timers(timers: SharedTimers, victims: Vec<TimerId>) -> usize {
    let mut cancelled = 0;
    for id in victims {
        if timers.lock().del(id).is_some() {
            cancelled += 1;
        }
        tokio::task::yield_now().await;
    }
    cancelled
}
