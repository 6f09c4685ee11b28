//! Experience, levels, streaks, charts and achievements.
//!
//! Everything here is a pure function of a [`Statistics`] snapshot and the
//! current calendar day, so the controller can call it on every completion
//! and the front end can call it on every render.

use crate::models::{date_key, Interval, Statistics};
use chrono::{Datelike, Duration, Months, NaiveDate};
use std::str::FromStr;

/// Experience credited for a completed work interval.
pub const WORK_XP: u32 = 30;
/// Experience credited for any other completed interval.
pub const BREAK_XP: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    pub name: &'static str,
    pub min_xp: u32,
    pub icon: &'static str,
}

pub static LEVELS: &[Level] = &[
    Level { name: "Beginner", min_xp: 0, icon: "🌱" },
    Level { name: "Focused", min_xp: 200, icon: "🔥" },
    Level { name: "Dedicated", min_xp: 500, icon: "⚡" },
    Level { name: "Expert", min_xp: 1000, icon: "💎" },
    Level { name: "Master", min_xp: 2000, icon: "👑" },
    Level { name: "Legendary", min_xp: 4000, icon: "🏆" },
];

/// Index of the highest threshold not exceeding `xp`.
///
/// `thresholds` must be ascending; the first entry is treated as the floor.
pub fn level_for(thresholds: &[u32], xp: u32) -> usize {
    thresholds.iter().rposition(|&min| xp >= min).unwrap_or(0)
}

/// Fraction of the way from the current threshold to the next, clamped to
/// [0, 1]. At the top level there is no next threshold and the result is 1.0.
pub fn progress_to_next(thresholds: &[u32], xp: u32) -> f32 {
    let index = level_for(thresholds, xp);
    let Some(&next) = thresholds.get(index + 1) else {
        return 1.0;
    };
    let current = thresholds.get(index).copied().unwrap_or(0);
    let span = next.saturating_sub(current);
    if span == 0 {
        return 1.0;
    }
    (xp.saturating_sub(current) as f32 / span as f32).clamp(0.0, 1.0)
}

/// Where a given amount of experience sits on the level ladder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelStatus {
    pub index: usize,
    pub current: &'static Level,
    pub next: Option<&'static Level>,
    /// Experience earned since reaching the current level.
    pub xp_into_level: u32,
    /// Experience between the current and the next level (0 at max level).
    pub xp_to_advance: u32,
    pub progress: f32,
}

impl LevelStatus {
    pub fn is_max(&self) -> bool {
        self.next.is_none()
    }
}

pub fn level_status(xp: u32) -> LevelStatus {
    let thresholds: Vec<u32> = LEVELS.iter().map(|l| l.min_xp).collect();
    let index = level_for(&thresholds, xp);
    let current = &LEVELS[index];
    let next = LEVELS.get(index + 1);

    LevelStatus {
        index,
        current,
        next,
        xp_into_level: xp.saturating_sub(current.min_xp),
        xp_to_advance: next.map_or(0, |n| n.min_xp - current.min_xp),
        progress: progress_to_next(&thresholds, xp),
    }
}

/// Credits a naturally completed interval and returns the experience gained.
///
/// Work intervals also feed the totals, today's ledger entry and the streak.
pub fn record_completion(stats: &mut Statistics, interval: &Interval, today: NaiveDate) -> u32 {
    if !interval.is_work() {
        stats.xp += BREAK_XP;
        return BREAK_XP;
    }

    stats.xp += WORK_XP;
    stats.total_work_intervals += 1;
    stats.total_work_minutes += interval.minutes;

    let entry = stats.day_mut(today);
    entry.work_minutes += interval.minutes;
    entry.work_intervals += 1;

    update_streak(stats, today);
    WORK_XP
}

/// Applies the streak rule after today's entry has been incremented.
///
/// The rule is local: it only looks at yesterday and today, and it adds one
/// per qualifying completion rather than per calendar day.
fn update_streak(stats: &mut Statistics, today: NaiveDate) {
    let had_yesterday = today
        .pred_opt()
        .map(|yesterday| stats.day(yesterday).work_intervals > 0)
        .unwrap_or(false);
    let today_count = stats.day(today).work_intervals;

    stats.streak_days = if had_yesterday || today_count > 1 {
        stats.streak_days + 1
    } else {
        1
    };
}

pub fn record_cycle_completion(stats: &mut Statistics) {
    stats.completed_cycles += 1;
}

/// One bar of a work-minutes chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartBar {
    pub label: String,
    pub minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartRange {
    /// Last 7 days, one bar per day.
    Day,
    /// Last 4 weeks, one bar per 7-day window ending today.
    #[default]
    Week,
    /// Last 6 calendar months.
    Month,
}

impl FromStr for ChartRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "days" => Ok(Self::Day),
            "week" | "weeks" => Ok(Self::Week),
            "month" | "months" => Ok(Self::Month),
            other => Err(format!("unknown range '{other}' (day, week, month)")),
        }
    }
}

pub fn chart(stats: &Statistics, today: NaiveDate, range: ChartRange) -> Vec<ChartBar> {
    match range {
        ChartRange::Day => daily_chart(stats, today),
        ChartRange::Week => weekly_chart(stats, today),
        ChartRange::Month => monthly_chart(stats, today),
    }
}

pub fn daily_chart(stats: &Statistics, today: NaiveDate) -> Vec<ChartBar> {
    (0..7i64)
        .rev()
        .map(|back| {
            let day = today - Duration::days(back);
            ChartBar {
                label: day.format("%a").to_string(),
                minutes: stats.day(day).work_minutes,
            }
        })
        .collect()
}

pub fn weekly_chart(stats: &Statistics, today: NaiveDate) -> Vec<ChartBar> {
    (0..4i64)
        .map(|week| {
            let weeks_back = 3 - week;
            let minutes = (0..7i64)
                .map(|d| stats.day(today - Duration::days(weeks_back * 7 + d)).work_minutes)
                .sum();
            ChartBar {
                label: format!("W{}", week + 1),
                minutes,
            }
        })
        .collect()
}

pub fn monthly_chart(stats: &Statistics, today: NaiveDate) -> Vec<ChartBar> {
    (0..6u32)
        .rev()
        .map(|back| {
            let month = today
                .with_day(1)
                .and_then(|first| first.checked_sub_months(Months::new(back)))
                .unwrap_or(today);
            let prefix = month.format("%Y-%m-").to_string();
            let minutes = stats
                .daily
                .range(prefix.clone()..)
                .take_while(|(key, _)| key.starts_with(&prefix))
                .map(|(_, entry)| entry.work_minutes)
                .sum();
            ChartBar {
                label: month.format("%b").to_string(),
                minutes,
            }
        })
        .collect()
}

/// Work minutes logged today.
pub fn today_minutes(stats: &Statistics, today: NaiveDate) -> u32 {
    stats
        .daily
        .get(&date_key(today))
        .map_or(0, |entry| entry.work_minutes)
}

/// A named goal, recomputed from the statistics every time it is queried.
#[derive(Clone, Copy)]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub unlocked: fn(&Statistics, NaiveDate) -> bool,
}

fn first_interval(s: &Statistics, _today: NaiveDate) -> bool {
    s.total_work_intervals >= 1
}

fn ten_intervals(s: &Statistics, _today: NaiveDate) -> bool {
    s.total_work_intervals >= 10
}

fn fifty_intervals(s: &Statistics, _today: NaiveDate) -> bool {
    s.total_work_intervals >= 50
}

fn three_day_streak(s: &Statistics, _today: NaiveDate) -> bool {
    s.streak_days >= 3
}

fn seven_day_streak(s: &Statistics, _today: NaiveDate) -> bool {
    s.streak_days >= 7
}

fn two_hours_today(s: &Statistics, today: NaiveDate) -> bool {
    today_minutes(s, today) >= 120
}

fn one_cycle(s: &Statistics, _today: NaiveDate) -> bool {
    s.completed_cycles >= 1
}

fn five_cycles(s: &Statistics, _today: NaiveDate) -> bool {
    s.completed_cycles >= 5
}

pub static ACHIEVEMENTS: &[Achievement] = &[
    Achievement {
        id: "first",
        name: "First Step",
        description: "Complete your first work interval",
        icon: "🎯",
        unlocked: first_interval,
    },
    Achievement {
        id: "ten",
        name: "On Fire",
        description: "Complete 10 work intervals",
        icon: "🔥",
        unlocked: ten_intervals,
    },
    Achievement {
        id: "fifty",
        name: "Tireless",
        description: "Complete 50 work intervals",
        icon: "💪",
        unlocked: fifty_intervals,
    },
    Achievement {
        id: "streak3",
        name: "Consistent",
        description: "3 days in a row",
        icon: "📅",
        unlocked: three_day_streak,
    },
    Achievement {
        id: "streak7",
        name: "Perfect Week",
        description: "7 days in a row",
        icon: "🗓️",
        unlocked: seven_day_streak,
    },
    Achievement {
        id: "two_hours",
        name: "Deep Focus",
        description: "2 hours of work in one day",
        icon: "⏱️",
        unlocked: two_hours_today,
    },
    Achievement {
        id: "cycle1",
        name: "Cyclist",
        description: "Complete a whole cycle",
        icon: "🔄",
        unlocked: one_cycle,
    },
    Achievement {
        id: "cycle5",
        name: "Marathoner",
        description: "Complete 5 whole cycles",
        icon: "🏅",
        unlocked: five_cycles,
    },
];

impl Achievement {
    pub fn is_unlocked(&self, stats: &Statistics, today: NaiveDate) -> bool {
        (self.unlocked)(stats, today)
    }
}

/// Pairs every achievement with its current unlock status.
pub fn achievement_status(
    stats: &Statistics,
    today: NaiveDate,
) -> Vec<(&'static Achievement, bool)> {
    ACHIEVEMENTS
        .iter()
        .map(|a| (a, a.is_unlocked(stats, today)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::default_intervals;

    const THRESHOLDS: [u32; 6] = [0, 200, 500, 1000, 2000, 4000];

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn work(minutes: u32) -> Interval {
        Interval::new("work", "Work", minutes, "#e05c5c")
    }

    #[test]
    fn test_level_lookup() {
        assert_eq!(level_for(&THRESHOLDS, 0), 0);
        assert_eq!(level_for(&THRESHOLDS, 199), 0);
        assert_eq!(level_for(&THRESHOLDS, 200), 1);
        assert_eq!(level_for(&THRESHOLDS, 999), 2);
        assert_eq!(level_for(&THRESHOLDS, 4000), 5);
        assert_eq!(level_for(&THRESHOLDS, 100_000), 5);
    }

    #[test]
    fn test_progress_to_next() {
        assert_eq!(progress_to_next(&THRESHOLDS, 0), 0.0);
        assert!((progress_to_next(&THRESHOLDS, 100) - 0.5).abs() < 0.001);
        assert!((progress_to_next(&THRESHOLDS, 350) - 0.5).abs() < 0.001);
        assert_eq!(progress_to_next(&THRESHOLDS, 4000), 1.0);
        assert_eq!(progress_to_next(&THRESHOLDS, 9999), 1.0);
    }

    #[test]
    fn test_level_status() {
        let status = level_status(230);
        assert_eq!(status.index, 1);
        assert_eq!(status.current.name, "Focused");
        assert_eq!(status.next.map(|l| l.name), Some("Dedicated"));
        assert_eq!(status.xp_into_level, 30);
        assert_eq!(status.xp_to_advance, 300);
        assert!(!status.is_max());

        let maxed = level_status(4000);
        assert_eq!(maxed.index, 5);
        assert!(maxed.is_max());
        assert_eq!(maxed.progress, 1.0);
        assert_eq!(maxed.xp_to_advance, 0);
    }

    #[test]
    fn test_work_completion_credits() {
        let today = date(2024, 5, 10);
        let mut stats = Statistics::default();

        let gained = record_completion(&mut stats, &work(25), today);

        assert_eq!(gained, 30);
        assert_eq!(stats.xp, 30);
        assert_eq!(stats.total_work_minutes, 25);
        assert_eq!(stats.total_work_intervals, 1);
        assert_eq!(stats.day(today).work_minutes, 25);
        assert_eq!(stats.day(today).work_intervals, 1);
    }

    #[test]
    fn test_break_completion_only_credits_xp() {
        let today = date(2024, 5, 10);
        let mut stats = Statistics {
            streak_days: 4,
            ..Statistics::default()
        };
        let short = default_intervals()[1].clone();

        let gained = record_completion(&mut stats, &short, today);

        assert_eq!(gained, 10);
        assert_eq!(stats.xp, 10);
        assert_eq!(stats.total_work_minutes, 0);
        assert_eq!(stats.total_work_intervals, 0);
        assert_eq!(stats.streak_days, 4);
        assert!(stats.daily.is_empty());
    }

    #[test]
    fn test_streak_starts_at_one() {
        let today = date(2024, 5, 10);
        let mut stats = Statistics::default();
        record_completion(&mut stats, &work(25), today);
        assert_eq!(stats.streak_days, 1);
    }

    #[test]
    fn test_streak_continues_from_yesterday() {
        let today = date(2024, 5, 10);
        let mut stats = Statistics {
            streak_days: 3,
            ..Statistics::default()
        };
        stats.day_mut(date(2024, 5, 9)).work_intervals = 2;

        record_completion(&mut stats, &work(25), today);
        assert_eq!(stats.streak_days, 4);
    }

    #[test]
    fn test_streak_resets_after_gap() {
        let today = date(2024, 5, 10);
        let mut stats = Statistics {
            streak_days: 6,
            ..Statistics::default()
        };
        stats.day_mut(date(2024, 5, 8)).work_intervals = 1;

        record_completion(&mut stats, &work(25), today);
        assert_eq!(stats.streak_days, 1);
    }

    #[test]
    fn test_streak_counts_repeat_completions_today() {
        // Local rule: a second completion on the same day still increments.
        let today = date(2024, 5, 10);
        let mut stats = Statistics::default();
        record_completion(&mut stats, &work(25), today);
        record_completion(&mut stats, &work(25), today);
        assert_eq!(stats.streak_days, 2);
    }

    #[test]
    fn test_streak_across_month_boundary() {
        let today = date(2024, 3, 1);
        let mut stats = Statistics {
            streak_days: 1,
            ..Statistics::default()
        };
        stats.day_mut(date(2024, 2, 29)).work_intervals = 1;

        record_completion(&mut stats, &work(25), today);
        assert_eq!(stats.streak_days, 2);
    }

    #[test]
    fn test_cycle_completion() {
        let mut stats = Statistics::default();
        record_cycle_completion(&mut stats);
        record_cycle_completion(&mut stats);
        assert_eq!(stats.completed_cycles, 2);
        assert_eq!(stats.xp, 0);
    }

    #[test]
    fn test_daily_chart() {
        let today = date(2024, 5, 10); // Friday
        let mut stats = Statistics::default();
        stats.day_mut(today).work_minutes = 50;
        stats.day_mut(date(2024, 5, 4)).work_minutes = 25;
        stats.day_mut(date(2024, 5, 3)).work_minutes = 999;

        let bars = daily_chart(&stats, today);
        assert_eq!(bars.len(), 7);
        assert_eq!(bars[0].label, "Sat");
        assert_eq!(bars[0].minutes, 25);
        assert_eq!(bars[6].label, "Fri");
        assert_eq!(bars[6].minutes, 50);
        assert_eq!(bars.iter().map(|b| b.minutes).sum::<u32>(), 75);
    }

    #[test]
    fn test_weekly_chart() {
        let today = date(2024, 5, 28);
        let mut stats = Statistics::default();
        stats.day_mut(today).work_minutes = 10;
        stats.day_mut(date(2024, 5, 22)).work_minutes = 20;
        stats.day_mut(date(2024, 5, 21)).work_minutes = 30;
        stats.day_mut(date(2024, 5, 1)).work_minutes = 40;
        stats.day_mut(date(2024, 4, 30)).work_minutes = 500;

        let bars = weekly_chart(&stats, today);
        let minutes: Vec<u32> = bars.iter().map(|b| b.minutes).collect();
        assert_eq!(minutes, vec![40, 0, 30, 30]);
        assert_eq!(bars[0].label, "W1");
        assert_eq!(bars[3].label, "W4");
    }

    #[test]
    fn test_monthly_chart() {
        let today = date(2024, 3, 31);
        let mut stats = Statistics::default();
        stats.day_mut(date(2024, 3, 2)).work_minutes = 25;
        stats.day_mut(date(2024, 3, 30)).work_minutes = 25;
        stats.day_mut(date(2024, 2, 29)).work_minutes = 50;
        stats.day_mut(date(2023, 10, 1)).work_minutes = 5;
        stats.day_mut(date(2023, 9, 30)).work_minutes = 1000;

        let bars = monthly_chart(&stats, today);
        let labels: Vec<&str> = bars.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["Oct", "Nov", "Dec", "Jan", "Feb", "Mar"]);
        let minutes: Vec<u32> = bars.iter().map(|b| b.minutes).collect();
        assert_eq!(minutes, vec![5, 0, 0, 0, 50, 50]);
    }

    #[test]
    fn test_chart_range_parsing() {
        assert_eq!("day".parse::<ChartRange>(), Ok(ChartRange::Day));
        assert_eq!("Months".parse::<ChartRange>(), Ok(ChartRange::Month));
        assert!("year".parse::<ChartRange>().is_err());
        assert_eq!(ChartRange::default(), ChartRange::Week);
    }

    #[test]
    fn test_achievement_ids_unique() {
        let mut ids: Vec<&str> = ACHIEVEMENTS.iter().map(|a| a.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), ACHIEVEMENTS.len());
    }

    #[test]
    fn test_achievements_locked_on_fresh_stats() {
        let stats = Statistics::default();
        let today = date(2024, 5, 10);
        assert!(achievement_status(&stats, today)
            .iter()
            .all(|(_, unlocked)| !unlocked));
    }

    #[test]
    fn test_interval_count_achievements() {
        let today = date(2024, 5, 10);
        let stats = Statistics {
            total_work_intervals: 10,
            ..Statistics::default()
        };
        assert!(first_interval(&stats, today));
        assert!(ten_intervals(&stats, today));
        assert!(!fifty_intervals(&stats, today));
    }

    #[test]
    fn test_streak_achievements() {
        let today = date(2024, 5, 10);
        let stats = Statistics {
            streak_days: 3,
            ..Statistics::default()
        };
        assert!(three_day_streak(&stats, today));
        assert!(!seven_day_streak(&stats, today));
    }

    #[test]
    fn test_two_hours_uses_todays_entry() {
        let today = date(2024, 5, 10);
        let mut stats = Statistics::default();
        stats.day_mut(date(2024, 5, 9)).work_minutes = 300;
        assert!(!two_hours_today(&stats, today));

        stats.day_mut(today).work_minutes = 120;
        assert!(two_hours_today(&stats, today));
    }

    #[test]
    fn test_cycle_achievements() {
        let today = date(2024, 5, 10);
        let stats = Statistics {
            completed_cycles: 5,
            ..Statistics::default()
        };
        let unlocked: Vec<&str> = achievement_status(&stats, today)
            .into_iter()
            .filter(|(_, done)| *done)
            .map(|(a, _)| a.id)
            .collect();
        assert_eq!(unlocked, vec!["cycle1", "cycle5"]);
    }
}
