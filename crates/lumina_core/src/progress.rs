//! crates/lumina_core/src/progress.rs
//!
//! Gamified progress derived on demand from a student's XP and learning logs.
//! Nothing here is stored; every figure is recomputed from scratch per call.

use chrono::{Datelike, Duration, NaiveDate, TimeZone, Weekday};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::domain::{LearningLog, User};

pub const XP_PER_LEVEL: u64 = 1000;

/// XP credited for each correctly answered practice question.
pub const XP_PER_CORRECT_ANSWER: u64 = 25;

/// Level 1 starts at 0 XP; a new level every 1000 XP.
pub fn level(xp: u64) -> u64 {
    xp / XP_PER_LEVEL + 1
}

/// How far through the current level the student is, in `[0, 100)`.
pub fn progress_percent_within_level(xp: u64) -> f64 {
    (xp % XP_PER_LEVEL) as f64 / 10.0
}

pub fn xp_to_next_level(xp: u64) -> u64 {
    XP_PER_LEVEL - xp % XP_PER_LEVEL
}

/// Calendar dates (in `tz`) with at least one log.
fn study_dates<Tz: TimeZone>(logs: &[LearningLog], tz: &Tz) -> BTreeSet<NaiveDate> {
    logs.iter()
        .map(|log| log.date.with_timezone(tz).date_naive())
        .collect()
}

/// Consecutive study days ending today, or yesterday if nothing is logged yet today.
pub fn streak<Tz: TimeZone>(logs: &[LearningLog], today: NaiveDate, tz: &Tz) -> u32 {
    let dates = study_dates(logs, tz);

    let mut day = if dates.contains(&today) {
        today
    } else {
        let yesterday = today - Duration::days(1);
        if !dates.contains(&yesterday) {
            return 0;
        }
        yesterday
    };

    let mut count = 0;
    while dates.contains(&day) {
        count += 1;
        day = day - Duration::days(1);
    }
    count
}

/// Minutes studied on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyMinutes {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub minutes: u64,
}

/// The trailing seven days ending `today`, oldest first. Empty days report 0.
pub fn weekly_study_minutes<Tz: TimeZone>(
    logs: &[LearningLog],
    today: NaiveDate,
    tz: &Tz,
) -> [DailyMinutes; 7] {
    std::array::from_fn(|i| {
        let date = today - Duration::days(6 - i as i64);
        let minutes = logs
            .iter()
            .filter(|log| log.date.with_timezone(tz).date_naive() == date)
            .map(|log| u64::from(log.duration))
            .sum();
        DailyMinutes {
            date,
            weekday: date.weekday(),
            minutes,
        }
    })
}

pub fn total_study_minutes(logs: &[LearningLog]) -> u64 {
    logs.iter().map(|log| u64::from(log.duration)).sum()
}

/// Everything the progress hub shows.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSummary {
    pub xp: u64,
    pub level: u64,
    pub level_progress_percent: f64,
    pub xp_to_next_level: u64,
    pub streak_days: u32,
    pub weekly_minutes: [DailyMinutes; 7],
    pub total_minutes: u64,
    /// The last three logs in recorded order, newest first.
    pub recent_logs: Vec<LearningLog>,
}

impl ProgressSummary {
    /// `logs` must be the user's logs in the order they were recorded.
    pub fn compute<Tz: TimeZone>(user: &User, logs: &[LearningLog], today: NaiveDate, tz: &Tz) -> Self {
        Self {
            xp: user.xp,
            level: level(user.xp),
            level_progress_percent: progress_percent_within_level(user.xp),
            xp_to_next_level: xp_to_next_level(user.xp),
            streak_days: streak(logs, today, tz),
            weekly_minutes: weekly_study_minutes(logs, today, tz),
            total_minutes: total_study_minutes(logs),
            recent_logs: logs.iter().rev().take(3).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Mood, Subject};
    use chrono::{FixedOffset, Utc};

    fn log_at(y: i32, m: u32, d: u32, hour: u32, duration: u32) -> LearningLog {
        LearningLog {
            id: format!("{}-{}-{}-{}", y, m, d, hour),
            user_id: "u1".to_string(),
            date: Utc.with_ymd_and_hms(y, m, d, hour, 0, 0).unwrap(),
            summary: "photosynthesis".to_string(),
            subject: Subject::Science,
            mood: Mood::Focused,
            duration,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn level_and_progress_follow_xp() {
        assert_eq!(level(0), 1);
        assert_eq!(level(999), 1);
        assert_eq!(level(1000), 2);
        assert_eq!(level(2_525), 3);
        assert_eq!(progress_percent_within_level(0), 0.0);
        assert_eq!(progress_percent_within_level(2_525), 52.5);
        assert_eq!(xp_to_next_level(2_525), 475);
        assert_eq!(xp_to_next_level(3_000), 1000);

        for xp in (0..10_000).step_by(37) {
            assert_eq!(level(xp), xp / 1000 + 1);
            let pct = progress_percent_within_level(xp);
            assert!((0.0..100.0).contains(&pct));
        }
    }

    #[test]
    fn streak_counts_through_today() {
        let logs = vec![log_at(2024, 1, 1, 10, 30), log_at(2024, 1, 2, 10, 30), log_at(2024, 1, 3, 10, 30)];
        assert_eq!(streak(&logs, date(2024, 1, 3), &Utc), 3);
    }

    #[test]
    fn streak_is_zero_after_a_gap() {
        let logs = vec![log_at(2024, 1, 1, 10, 30), log_at(2024, 1, 2, 10, 30), log_at(2024, 1, 3, 10, 30)];
        assert_eq!(streak(&logs, date(2024, 1, 5), &Utc), 0);
    }

    #[test]
    fn streak_counts_back_from_yesterday() {
        let logs = vec![
            log_at(2024, 3, 7, 8, 15),
            log_at(2024, 3, 8, 8, 15),
            log_at(2024, 3, 8, 19, 15),
            log_at(2024, 3, 9, 8, 15),
        ];
        assert_eq!(streak(&logs, date(2024, 3, 10), &Utc), 3);
    }

    #[test]
    fn streak_stops_at_first_gap() {
        let logs = vec![log_at(2024, 3, 1, 8, 15), log_at(2024, 3, 3, 8, 15), log_at(2024, 3, 4, 8, 15)];
        assert_eq!(streak(&logs, date(2024, 3, 4), &Utc), 2);
        assert_eq!(streak(&[], date(2024, 3, 4), &Utc), 0);
    }

    #[test]
    fn streak_uses_local_dates() {
        // 23:00 UTC on the 2nd is already the 3rd in UTC+2.
        let logs = vec![log_at(2024, 1, 2, 23, 30)];
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(streak(&logs, date(2024, 1, 3), &plus_two), 1);
        assert_eq!(streak(&logs, date(2024, 1, 4), &Utc), 0);
    }

    #[test]
    fn huge_durations_on_one_day_do_not_overflow() {
        let logs = vec![
            log_at(2024, 1, 10, 8, u32::MAX),
            log_at(2024, 1, 10, 9, u32::MAX),
        ];
        let week = weekly_study_minutes(&logs, date(2024, 1, 10), &Utc);
        assert_eq!(week[6].minutes, 2 * u64::from(u32::MAX));
        assert_eq!(total_study_minutes(&logs), 2 * u64::from(u32::MAX));
    }

    #[test]
    fn weekly_minutes_buckets_by_day() {
        let logs = vec![
            log_at(2024, 1, 10, 8, 30),
            log_at(2024, 1, 10, 12, 45),
            log_at(2024, 1, 10, 18, 60),
            log_at(2024, 1, 8, 9, 15),
            log_at(2024, 1, 1, 9, 120),
        ];
        let week = weekly_study_minutes(&logs, date(2024, 1, 10), &Utc);

        assert_eq!(week[0].date, date(2024, 1, 4));
        assert_eq!(week[6].date, date(2024, 1, 10));
        assert_eq!(week[6].weekday, Weekday::Wed);
        assert_eq!(week[6].minutes, 135);
        assert_eq!(week[4].minutes, 15);
        assert_eq!(week[5].minutes, 0);
        assert_eq!(week.iter().map(|d| d.minutes).sum::<u64>(), 150);
    }

    #[test]
    fn summary_shows_last_three_recorded_logs() {
        let user = User {
            id: "u1".to_string(),
            name: "Charlie".to_string(),
            email: String::new(),
            secret_code: "abc".to_string(),
            year_group: "Year 7".to_string(),
            target_grade: "Expected Standard".to_string(),
            avatar: String::new(),
            join_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            xp: 1_025,
            syllabus_mastery: Default::default(),
        };
        let logs: Vec<LearningLog> = (1..=5).map(|d| log_at(2024, 1, d, 9, 30)).collect();

        let summary = ProgressSummary::compute(&user, &logs, date(2024, 1, 5), &Utc);
        assert_eq!(summary.level, 2);
        assert_eq!(summary.streak_days, 5);
        assert_eq!(summary.total_minutes, 150);
        let recent: Vec<&str> = summary.recent_logs.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(recent, vec!["2024-1-5-9", "2024-1-4-9", "2024-1-3-9"]);
    }
}
