//! Periodic jobs aligned to wall-clock boundaries.

use std::sync::Arc;

use crate::{prelude::*, state::AppState};

pub struct Plugin;

/// Time until the next multiple of `period` since midnight, strictly after
/// `now`.
pub fn until_next_boundary(now: DateTime, period: Duration) -> Duration {
  const NANOS: u128 = 1_000_000_000;

  let period = period.as_nanos().max(1);
  let nanos = u128::from(now.nanosecond()).min(NANOS - 1);
  let elapsed = u128::from(now.num_seconds_from_midnight()) * NANOS + nanos;
  let remaining = period - elapsed % period;

  Duration::from_nanos(u64::try_from(remaining).unwrap_or(u64::MAX))
}

async fn tick(app: &AppState) {
  app.gc_reports();

  match app.flush().await {
    Ok(()) => debug!("Registry checkpoint written"),
    Err(err) => error!("Registry checkpoint failed: {err}"),
  }
}

#[async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let period = app.config.schedule_period;
    let delay = until_next_boundary(Utc::now().naive_utc(), period);

    info!(
      "Next scheduled run in {}",
      humantime::format_duration(Duration::from_secs(delay.as_secs()))
    );

    let mut interval = time::interval_at(time::Instant::now() + delay, period);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
      interval.tick().await;
      tick(&app).await;
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  const QUARTER: Duration = Duration::from_secs(15 * 60);

  fn at(h: u32, m: u32, s: u32, milli: u32) -> DateTime {
    NaiveDate::from_ymd_opt(2026, 10, 18)
      .unwrap()
      .and_hms_milli_opt(h, m, s, milli)
      .unwrap()
  }

  #[test]
  fn test_until_next_quarter() {
    assert_eq!(
      until_next_boundary(at(12, 7, 30, 0), QUARTER),
      Duration::from_secs(7 * 60 + 30)
    );
    assert_eq!(
      until_next_boundary(at(12, 14, 59, 500), QUARTER),
      Duration::from_millis(500)
    );
    assert_eq!(
      until_next_boundary(at(23, 59, 0, 0), QUARTER),
      Duration::from_secs(60)
    );
  }

  #[test]
  fn test_on_boundary_waits_full_period() {
    assert_eq!(until_next_boundary(at(12, 15, 0, 0), QUARTER), QUARTER);
    assert_eq!(until_next_boundary(at(0, 0, 0, 0), QUARTER), QUARTER);
  }

  #[tokio::test]
  async fn test_tick_flushes_registry() {
    let app = crate::state::tests::state(Default::default()).await;
    app
      .registry
      .create(crate::registry::NewApplication {
        id: 1,
        identifier: "app".into(),
        display_name: "App".into(),
        description: String::new(),
        alias: vec![],
        owner: 1,
        channel: None,
      })
      .unwrap();

    tick(&app).await;

    let stored = app.sv().application.load().await.unwrap();
    assert_eq!(stored.resolve("app").unwrap().id(), 1);
  }
}
