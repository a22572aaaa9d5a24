use crate::agent::TipAgent;
use crate::cron::CronSchedule;
use crate::formatting::{post_tip, Presentation};
use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use chrono_tz::Tz;
use log::{debug, error, info};
use serenity::http::Http;
use serenity::model::id::ChannelId;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Remembers the last minute that fired so a pattern fires once per minute
/// even though the clock is checked more often.
#[derive(Debug, Default)]
struct FiringGuard {
    // Wall-clock minute, so a repeated hour on DST fall-back does not fire twice.
    last_fired: Option<NaiveDateTime>,
}

impl FiringGuard {
    fn should_fire(&mut self, schedule: &CronSchedule, now: DateTime<Tz>) -> bool {
        let minute = match now.with_second(0).and_then(|t| t.with_nanosecond(0)) {
            Some(minute) => minute,
            None => return false,
        };
        let wall_clock = minute.naive_local();
        if !schedule.matches(&minute) || self.last_fired == Some(wall_clock) {
            return false;
        }
        self.last_fired = Some(wall_clock);
        true
    }
}

pub struct DailyTipScheduler {
    agent: Arc<TipAgent>,
    schedule: CronSchedule,
    timezone: Tz,
    channel_id: u64,
    presentation: Presentation,
    message_cap: usize,
}

impl DailyTipScheduler {
    pub fn new(
        agent: Arc<TipAgent>,
        schedule: CronSchedule,
        timezone: Tz,
        channel_id: u64,
        presentation: Presentation,
        message_cap: usize,
    ) -> Self {
        Self {
            agent,
            schedule,
            timezone,
            channel_id,
            presentation,
            message_cap,
        }
    }

    /// Start the scheduler loop. Spawn this as a tokio task.
    pub async fn run(&self, http: Arc<Http>) {
        let mut check_interval = interval(CHECK_INTERVAL);
        let mut guard = FiringGuard::default();

        info!(
            "⏰ Daily tip scheduler started ({} in {})",
            self.schedule.as_str(),
            self.timezone
        );

        loop {
            check_interval.tick().await;

            let now = Utc::now().with_timezone(&self.timezone);
            if !guard.should_fire(&self.schedule, now) {
                continue;
            }

            info!("⏰ Schedule matched at {}, posting daily tip", now.format("%Y-%m-%d %H:%M %Z"));
            match self.post_daily_tip(&http).await {
                Ok(_) => info!("✅ Daily tip posted to channel {}", self.channel_id),
                Err(e) => error!("❌ Failed to post daily tip: {}", e),
            }
        }
    }

    async fn post_daily_tip(&self, http: &Arc<Http>) -> Result<()> {
        let channel = ChannelId(self.channel_id).to_channel(http).await?;
        debug!("Fetched tip channel {}", channel.id());

        let daily = self.agent.generate_daily_tip(None).await;
        post_tip(http, channel.id(), &daily, self.presentation, self.message_cap).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Stockholm;

    #[test]
    fn test_fires_once_per_matching_minute() {
        let schedule = CronSchedule::parse("0 9 * * *").unwrap();
        let mut guard = FiringGuard::default();

        let first_check = Stockholm.with_ymd_and_hms(2025, 3, 10, 9, 0, 5).unwrap();
        let second_check = Stockholm.with_ymd_and_hms(2025, 3, 10, 9, 0, 35).unwrap();
        let next_minute = Stockholm.with_ymd_and_hms(2025, 3, 10, 9, 1, 5).unwrap();
        let next_day = Stockholm.with_ymd_and_hms(2025, 3, 11, 9, 0, 10).unwrap();

        assert!(guard.should_fire(&schedule, first_check));
        assert!(!guard.should_fire(&schedule, second_check));
        assert!(!guard.should_fire(&schedule, next_minute));
        assert!(guard.should_fire(&schedule, next_day));
    }

    #[test]
    fn test_repeated_hour_fires_once() {
        let schedule = CronSchedule::parse("30 2 * * *").unwrap();
        let mut guard = FiringGuard::default();
        // Stockholm falls back from 03:00 CEST to 02:00 CET on 2025-10-26.
        let local = Stockholm.with_ymd_and_hms(2025, 10, 26, 2, 30, 5);
        let first_pass = local.earliest().unwrap();
        let second_pass = local.latest().unwrap();
        assert_ne!(first_pass, second_pass);

        assert!(guard.should_fire(&schedule, first_pass));
        assert!(!guard.should_fire(&schedule, second_pass));
    }

    #[test]
    fn test_schedule_is_evaluated_in_local_time() {
        let schedule = CronSchedule::parse("0 9 * * *").unwrap();
        let mut guard = FiringGuard::default();
        // 08:00 UTC is 09:00 in Stockholm during winter time.
        let utc = Utc.with_ymd_and_hms(2025, 1, 15, 8, 0, 0).unwrap();
        assert!(guard.should_fire(&schedule, utc.with_timezone(&Stockholm)));
    }
}
