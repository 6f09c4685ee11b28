//! Data models for the pomoquest application.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Id of the interval that counts as work. Every other interval is a break.
pub const WORK_INTERVAL_ID: &str = "work";

/// Shortest interval a user can configure, in minutes.
pub const MIN_INTERVAL_MINUTES: u32 = 1;
/// Longest interval a user can configure, in minutes.
pub const MAX_INTERVAL_MINUTES: u32 = 90;

/// Ids of the cycles that ship with the application.
pub const BUILTIN_CYCLE_IDS: [&str; 2] = ["classic", "sprint"];

/// Name shown when the user has not set one.
pub const DEFAULT_USER_NAME: &str = "Guest";

pub fn clamp_minutes(minutes: u32) -> u32 {
    minutes.clamp(MIN_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES)
}

pub fn is_builtin_cycle(id: &str) -> bool {
    BUILTIN_CYCLE_IDS.contains(&id)
}

/// Ledger key for a calendar day (`YYYY-MM-DD`).
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// A named countdown duration, used both as a free-mode interval and as a cycle step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub id: String,
    pub label: String,
    pub minutes: u32,
    pub color: String,
}

impl Interval {
    pub fn new(id: &str, label: &str, minutes: u32, color: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            minutes,
            color: color.to_string(),
        }
    }

    /// Returns true if completing this interval counts as work.
    pub fn is_work(&self) -> bool {
        self.id == WORK_INTERVAL_ID
    }

    /// Full duration in seconds.
    pub fn total_secs(&self) -> u32 {
        self.minutes * 60
    }
}

pub fn default_intervals() -> Vec<Interval> {
    vec![
        Interval::new("work", "Work", 25, "#e05c5c"),
        Interval::new("short", "Short Break", 5, "#4ecdc4"),
        Interval::new("long", "Long Break", 10, "#6c8ebf"),
    ]
}

/// What happens once the last step of a cycle completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishPolicy {
    /// Return to free mode and wait.
    Stop,
    /// Start again from the first step.
    Repeat,
    /// Let the user decide between repeating and stopping.
    #[default]
    Ask,
}

impl FinishPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Repeat => "repeat",
            Self::Ask => "ask",
        }
    }
}

impl fmt::Display for FinishPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FinishPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stop" => Ok(Self::Stop),
            "repeat" => Ok(Self::Repeat),
            "ask" => Ok(Self::Ask),
            other => Err(format!("unknown finish policy '{other}' (stop, repeat, ask)")),
        }
    }
}

/// Completion tone selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundChoice {
    #[default]
    Bell,
    Digital,
    Soft,
    None,
}

impl SoundChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bell => "bell",
            Self::Digital => "digital",
            Self::Soft => "soft",
            Self::None => "none",
        }
    }
}

impl fmt::Display for SoundChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SoundChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bell" => Ok(Self::Bell),
            "digital" => Ok(Self::Digital),
            "soft" => Ok(Self::Soft),
            "none" => Ok(Self::None),
            other => Err(format!(
                "unknown sound '{other}' (bell, digital, soft, none)"
            )),
        }
    }
}

/// An ordered sequence of intervals with a policy for what follows the last one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cycle {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub steps: Vec<Interval>,
    #[serde(default)]
    pub on_finish: FinishPolicy,
}

impl Cycle {
    pub fn total_minutes(&self) -> u32 {
        self.steps.iter().map(|s| s.minutes).sum()
    }

    pub fn is_builtin(&self) -> bool {
        is_builtin_cycle(&self.id)
    }
}

pub fn builtin_cycles() -> Vec<Cycle> {
    let work = Interval::new("work", "Work", 25, "#e05c5c");
    let short = Interval::new("short", "Short Break", 5, "#4ecdc4");
    let long = Interval::new("long", "Long Break", 10, "#6c8ebf");

    vec![
        Cycle {
            id: "classic".to_string(),
            name: "Classic".to_string(),
            emoji: "🍅".to_string(),
            steps: vec![
                work.clone(),
                short.clone(),
                work.clone(),
                short.clone(),
                work.clone(),
                short,
                work,
                long.clone(),
            ],
            on_finish: FinishPolicy::Ask,
        },
        Cycle {
            id: "sprint".to_string(),
            name: "Sprint".to_string(),
            emoji: "⚡".to_string(),
            steps: vec![Interval::new("work", "Work", 50, "#e05c5c"), long],
            on_finish: FinishPolicy::Ask,
        },
    ]
}

/// User-configurable preferences, persisted as one record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    pub dark_mode: bool,
    pub intervals: Vec<Interval>,
    pub sound: SoundChoice,
    pub user_name: String,
    /// User-created cycles. Built-in cycles are never stored here.
    pub cycles: Vec<Cycle>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            dark_mode: true,
            intervals: default_intervals(),
            sound: SoundChoice::default(),
            user_name: DEFAULT_USER_NAME.to_string(),
            cycles: Vec::new(),
        }
    }
}

impl Preferences {
    /// Repairs a loaded record so that the rest of the application can rely on its invariants.
    pub fn normalize(&mut self) {
        if self.intervals.is_empty() {
            self.intervals = default_intervals();
        }
        for interval in &mut self.intervals {
            interval.minutes = clamp_minutes(interval.minutes);
        }
        if self.user_name.trim().is_empty() {
            self.user_name = DEFAULT_USER_NAME.to_string();
        }
        self.cycles
            .retain(|c| !c.steps.is_empty() && !is_builtin_cycle(&c.id));
        for cycle in &mut self.cycles {
            for step in &mut cycle.steps {
                step.minutes = clamp_minutes(step.minutes);
            }
        }
    }
}

/// Work done on a single calendar day.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct DayEntry {
    pub work_minutes: u32,
    pub work_intervals: u32,
}

/// Accumulated progress, persisted as one record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Statistics {
    pub xp: u32,
    pub total_work_intervals: u32,
    pub total_work_minutes: u32,
    pub streak_days: u32,
    pub completed_cycles: u32,
    /// Keyed by `YYYY-MM-DD`.
    pub daily: BTreeMap<String, DayEntry>,
}

impl Statistics {
    /// Returns the ledger entry for a day, or an empty one.
    pub fn day(&self, date: NaiveDate) -> DayEntry {
        self.daily.get(&date_key(date)).copied().unwrap_or_default()
    }

    pub fn day_mut(&mut self, date: NaiveDate) -> &mut DayEntry {
        self.daily.entry(date_key(date)).or_default()
    }
}

/// Countdown state, always bound to the current interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Ready to start at the full duration.
    Idle { total_secs: u32 },
    /// Counting down.
    Running { remaining_secs: u32, total_secs: u32 },
    /// Stopped by the user with time left.
    Paused { remaining_secs: u32, total_secs: u32 },
    /// Reached zero.
    Expired { total_secs: u32 },
}

impl TimerState {
    pub fn idle(total_secs: u32) -> Self {
        Self::Idle { total_secs }
    }

    /// A freshly loaded interval that starts counting immediately.
    pub fn running(total_secs: u32) -> Self {
        Self::Running {
            remaining_secs: total_secs,
            total_secs,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle { .. })
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused { .. })
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired { .. })
    }

    pub fn remaining_secs(&self) -> u32 {
        match self {
            Self::Idle { total_secs } => *total_secs,
            Self::Running { remaining_secs, .. } | Self::Paused { remaining_secs, .. } => {
                *remaining_secs
            }
            Self::Expired { .. } => 0,
        }
    }

    pub fn total_secs(&self) -> u32 {
        match self {
            Self::Idle { total_secs }
            | Self::Running { total_secs, .. }
            | Self::Paused { total_secs, .. }
            | Self::Expired { total_secs } => *total_secs,
        }
    }

    /// Returns the elapsed fraction (0.0 to 1.0) of the current interval.
    pub fn progress_percent(&self) -> f32 {
        let total = self.total_secs();
        if total == 0 {
            return 1.0;
        }
        1.0 - (self.remaining_secs() as f32 / total as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_state_idle() {
        let state = TimerState::idle(1500);
        assert!(state.is_idle());
        assert!(!state.is_running());
        assert!(!state.is_paused());
        assert!(!state.is_expired());
        assert_eq!(state.remaining_secs(), 1500);
        assert_eq!(state.progress_percent(), 0.0);
    }

    #[test]
    fn test_timer_state_running_progress() {
        let state = TimerState::Running {
            remaining_secs: 1200,
            total_secs: 1500,
        };
        assert!(state.is_running());
        assert_eq!(state.remaining_secs(), 1200);
        assert_eq!(state.total_secs(), 1500);

        // 300 seconds elapsed out of 1500
        assert!((state.progress_percent() - 0.2).abs() < 0.01);
    }

    #[test]
    fn test_timer_state_expired() {
        let state = TimerState::Expired { total_secs: 300 };
        assert!(state.is_expired());
        assert_eq!(state.remaining_secs(), 0);
        assert!((state.progress_percent() - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_timer_state_progress_division_by_zero() {
        let state = TimerState::Expired { total_secs: 0 };
        assert_eq!(state.progress_percent(), 1.0);
    }

    #[test]
    fn test_interval_category() {
        let intervals = default_intervals();
        assert!(intervals[0].is_work());
        assert!(!intervals[1].is_work());
        assert!(!intervals[2].is_work());
        assert_eq!(intervals[0].total_secs(), 25 * 60);
    }

    #[test]
    fn test_builtin_cycles() {
        let cycles = builtin_cycles();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].id, "classic");
        assert_eq!(cycles[0].steps.len(), 8);
        assert_eq!(cycles[0].total_minutes(), 4 * 25 + 3 * 5 + 10);
        assert_eq!(cycles[1].id, "sprint");
        assert_eq!(cycles[1].total_minutes(), 60);
        assert!(cycles.iter().all(|c| c.is_builtin()));
        assert!(cycles.iter().all(|c| c.on_finish == FinishPolicy::Ask));
    }

    #[test]
    fn test_clamp_minutes() {
        assert_eq!(clamp_minutes(0), 1);
        assert_eq!(clamp_minutes(45), 45);
        assert_eq!(clamp_minutes(500), 90);
    }

    #[test]
    fn test_preferences_default() {
        let prefs = Preferences::default();
        assert!(prefs.dark_mode);
        assert_eq!(prefs.intervals, default_intervals());
        assert_eq!(prefs.sound, SoundChoice::Bell);
        assert_eq!(prefs.user_name, "Guest");
        assert!(prefs.cycles.is_empty());
    }

    #[test]
    fn test_preferences_normalize() {
        let mut prefs = Preferences {
            intervals: vec![],
            user_name: "   ".to_string(),
            cycles: vec![
                Cycle {
                    id: "classic".to_string(),
                    name: "Shadow".to_string(),
                    emoji: "🍅".to_string(),
                    steps: default_intervals(),
                    on_finish: FinishPolicy::Stop,
                },
                Cycle {
                    id: "empty".to_string(),
                    name: "Empty".to_string(),
                    emoji: "🍅".to_string(),
                    steps: vec![],
                    on_finish: FinishPolicy::Stop,
                },
                Cycle {
                    id: "mine".to_string(),
                    name: "Mine".to_string(),
                    emoji: "📚".to_string(),
                    steps: vec![Interval::new("work", "Work", 200, "#e05c5c")],
                    on_finish: FinishPolicy::Repeat,
                },
            ],
            ..Preferences::default()
        };

        prefs.normalize();

        assert_eq!(prefs.intervals, default_intervals());
        assert_eq!(prefs.user_name, "Guest");
        assert_eq!(prefs.cycles.len(), 1);
        assert_eq!(prefs.cycles[0].id, "mine");
        assert_eq!(prefs.cycles[0].steps[0].minutes, 90);
    }

    #[test]
    fn test_statistics_day_lookup() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let mut stats = Statistics::default();
        assert_eq!(stats.day(date), DayEntry::default());

        stats.day_mut(date).work_minutes += 25;
        stats.day_mut(date).work_intervals += 1;

        assert_eq!(
            stats.day(date),
            DayEntry {
                work_minutes: 25,
                work_intervals: 1
            }
        );
        assert!(stats.daily.contains_key("2024-01-15"));
    }

    #[test]
    fn test_policy_and_sound_parsing() {
        assert_eq!("Repeat".parse::<FinishPolicy>(), Ok(FinishPolicy::Repeat));
        assert_eq!("stop".parse::<FinishPolicy>(), Ok(FinishPolicy::Stop));
        assert!("later".parse::<FinishPolicy>().is_err());
        assert_eq!("digital".parse::<SoundChoice>(), Ok(SoundChoice::Digital));
        assert_eq!(SoundChoice::None.to_string(), "none");
        assert!("loud".parse::<SoundChoice>().is_err());
    }

    #[test]
    fn test_statistics_json_field_names() {
        let mut stats = Statistics {
            xp: 40,
            ..Statistics::default()
        };
        stats.day_mut(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()).work_intervals = 1;

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["xp"], 40);
        assert_eq!(json["daily"]["2024-03-01"]["workIntervals"], 1);
        assert!(json.get("totalWorkMinutes").is_some());
    }
}
