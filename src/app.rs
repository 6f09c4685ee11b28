//! Main application state and logic.
//!
//! [`App`] owns every piece of authoritative state: preferences, statistics,
//! the countdown and the cycle run. All changes go through its methods, which
//! keep the ticker armed exactly while the countdown is running and write
//! preferences and statistics back to the store after every mutation.

use crate::editor::{CycleDraft, CycleError};
use crate::models::{
    builtin_cycles, clamp_minutes, is_builtin_cycle, Cycle, FinishPolicy, Interval, Preferences,
    SoundChoice, Statistics, TimerState, DEFAULT_USER_NAME,
};
use crate::persistence::{self, Store};
use crate::progress;
use crate::timer::{self, Ticker};
use chrono::{Local, NaiveDate};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, PartialEq)]
pub enum AppError {
    #[error("Cycle error: {0}")]
    Cycle(#[from] CycleError),
    #[error("no interval at position {0}")]
    UnknownInterval(usize),
    #[error("no cycle with id '{0}'")]
    UnknownCycle(String),
    #[error("no cycle is running")]
    NotInCycle,
    #[error("interval label must not be empty")]
    EmptyLabel,
}

/// Events the front end reacts to with sounds and notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionEvent {
    IntervalComplete {
        label: String,
        work: bool,
        xp_gained: u32,
    },
    CycleComplete {
        name: String,
        policy: FinishPolicy,
    },
}

/// A transition held back until the user accepts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredAction {
    /// Leave the current interval (and any cycle) for a free-mode interval.
    SwitchInterval(usize),
    StartCycle(String),
    SkipStep,
    ExitCycle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConfirmation {
    pub message: String,
    pub action: DeferredAction,
}

/// The user's answer once a cycle with the `ask` policy completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleChoice {
    Repeat,
    Stop,
}

/// Position within the active cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleRun {
    pub active: bool,
    pub cycle_id: String,
    /// Valid index into the active cycle's steps while `active`; 0 otherwise.
    pub step_index: usize,
}

impl Default for CycleRun {
    fn default() -> Self {
        Self {
            active: false,
            cycle_id: "classic".to_string(),
            step_index: 0,
        }
    }
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Main application state.
pub struct App {
    pub state: TimerState,
    pub preferences: Preferences,
    pub statistics: Statistics,
    pub cycle_run: CycleRun,
    free_index: usize,
    builtins: Vec<Cycle>,
    pending: Option<PendingConfirmation>,
    decision_pending: bool,
    events: Vec<CompletionEvent>,
    store: Box<dyn Store>,
    ticker: Box<dyn Ticker>,
    today: fn() -> NaiveDate,
}

impl App {
    /// Creates a new application instance from what the store holds.
    pub fn new(store: Box<dyn Store>, ticker: Box<dyn Ticker>) -> Self {
        let preferences = persistence::load_preferences(store.as_ref());
        let statistics = persistence::load_statistics(store.as_ref());
        let state = TimerState::idle(preferences.intervals[0].total_secs());

        Self {
            state,
            preferences,
            statistics,
            cycle_run: CycleRun::default(),
            free_index: 0,
            builtins: builtin_cycles(),
            pending: None,
            decision_pending: false,
            events: Vec::new(),
            store,
            ticker,
            today: local_today,
        }
    }

    /// Replaces the calendar used for ledger entries (for testing).
    #[cfg(test)]
    pub fn set_clock(&mut self, today: fn() -> NaiveDate) {
        self.today = today;
    }

    pub fn today(&self) -> NaiveDate {
        (self.today)()
    }

    /// Built-in cycles followed by the user's own.
    pub fn cycles(&self) -> impl Iterator<Item = &Cycle> {
        self.builtins.iter().chain(self.preferences.cycles.iter())
    }

    pub fn find_cycle(&self, id: &str) -> Option<&Cycle> {
        self.cycles().find(|c| c.id == id)
    }

    /// The cycle being run, if cycle mode is active.
    pub fn active_cycle(&self) -> Option<&Cycle> {
        if self.cycle_run.active {
            self.find_cycle(&self.cycle_run.cycle_id)
        } else {
            None
        }
    }

    pub fn in_cycle(&self) -> bool {
        self.cycle_run.active
    }

    /// Index of the free-mode interval, kept while a cycle runs.
    pub fn free_index(&self) -> usize {
        self.free_index
    }

    /// The interval the countdown is bound to.
    pub fn current_interval(&self) -> &Interval {
        self.active_cycle()
            .and_then(|c| c.steps.get(self.cycle_run.step_index))
            .unwrap_or(&self.preferences.intervals[self.free_index])
    }

    pub fn pending_confirmation(&self) -> Option<&PendingConfirmation> {
        self.pending.as_ref()
    }

    /// True while a completed `ask` cycle waits for the user to repeat or stop.
    pub fn cycle_decision_pending(&self) -> bool {
        self.decision_pending
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.is_active()
    }

    /// Drains the completion events produced since the last call.
    pub fn take_events(&mut self) -> Vec<CompletionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn window_title(&self) -> String {
        timer::format_title(&self.state, &self.current_interval().label)
    }

    fn awaiting_user(&self) -> bool {
        self.pending.is_some() || self.decision_pending
    }

    /// Starts or resumes the countdown. An expired timer restarts from the full duration.
    pub fn start(&mut self) {
        if self.awaiting_user() {
            debug!("start ignored while awaiting the user");
            return;
        }
        self.state = match self.state {
            TimerState::Running { .. } => return,
            TimerState::Idle { total_secs } | TimerState::Expired { total_secs } => {
                TimerState::running(total_secs)
            }
            TimerState::Paused {
                remaining_secs,
                total_secs,
            } => TimerState::Running {
                remaining_secs,
                total_secs,
            },
        };
        self.sync_ticker(false);
    }

    pub fn pause(&mut self) {
        if self.awaiting_user() {
            return;
        }
        if let TimerState::Running {
            remaining_secs,
            total_secs,
        } = self.state
        {
            self.state = TimerState::Paused {
                remaining_secs,
                total_secs,
            };
            self.sync_ticker(false);
        }
    }

    pub fn toggle(&mut self) {
        if self.state.is_running() {
            self.pause();
        } else {
            self.start();
        }
    }

    /// Returns to the full duration of the current interval without recording anything.
    pub fn reset(&mut self) {
        if self.awaiting_user() {
            return;
        }
        self.state = TimerState::idle(self.current_interval().total_secs());
        self.sync_ticker(false);
    }

    /// Handles a fire from the ticker. Stale generations are dropped.
    pub fn on_timer_fired(&mut self, generation: u64) -> bool {
        if !self.ticker.is_current(generation) {
            debug!(generation, "dropping stale tick");
            return false;
        }
        self.tick()
    }

    /// Advances the countdown by one second.
    /// Returns true if the state changed.
    pub fn tick(&mut self) -> bool {
        let TimerState::Running {
            remaining_secs,
            total_secs,
        } = self.state
        else {
            return false;
        };

        if remaining_secs > 1 {
            self.state = TimerState::Running {
                remaining_secs: remaining_secs - 1,
                total_secs,
            };
        } else {
            self.state = TimerState::Expired { total_secs };
            self.complete_interval();
        }
        true
    }

    fn complete_interval(&mut self) {
        let interval = self.current_interval().clone();
        let today = self.today();
        let xp_gained = progress::record_completion(&mut self.statistics, &interval, today);
        self.persist_statistics();

        let work = interval.is_work();
        info!(label = %interval.label, xp_gained, "interval complete");
        self.events.push(CompletionEvent::IntervalComplete {
            label: interval.label,
            work,
            xp_gained,
        });

        if self.cycle_run.active {
            self.advance_cycle(self.cycle_run.step_index + 1);
        } else {
            self.sync_ticker(false);
        }
    }

    fn advance_cycle(&mut self, next_index: usize) {
        let Some(cycle) = self.active_cycle().cloned() else {
            warn!(cycle_id = %self.cycle_run.cycle_id, "active cycle vanished");
            self.exit_to_free_mode();
            return;
        };

        if next_index < cycle.steps.len() {
            self.cycle_run.step_index = next_index;
            self.state = TimerState::running(cycle.steps[next_index].total_secs());
            self.sync_ticker(true);
            return;
        }

        progress::record_cycle_completion(&mut self.statistics);
        self.persist_statistics();
        info!(cycle = %cycle.name, policy = %cycle.on_finish, "cycle complete");
        self.events.push(CompletionEvent::CycleComplete {
            name: cycle.name.clone(),
            policy: cycle.on_finish,
        });

        match cycle.on_finish {
            FinishPolicy::Repeat => self.restart_cycle(),
            FinishPolicy::Stop => self.exit_to_free_mode(),
            FinishPolicy::Ask => {
                self.state = TimerState::Expired {
                    total_secs: self.current_interval().total_secs(),
                };
                // A skip or exit asked for during the last step refers to a run that is over
                if let Some(stale) = self.pending.take() {
                    debug!(action = ?stale.action, "dropping confirmation for finished cycle");
                }
                self.decision_pending = true;
                self.sync_ticker(false);
            }
        }
    }

    fn restart_cycle(&mut self) {
        self.cycle_run.step_index = 0;
        self.state = TimerState::running(self.current_interval().total_secs());
        self.sync_ticker(true);
    }

    fn exit_to_free_mode(&mut self) {
        self.decision_pending = false;
        self.cycle_run.active = false;
        self.cycle_run.step_index = 0;
        self.state = TimerState::idle(self.current_interval().total_secs());
        self.sync_ticker(false);
    }

    /// Applies the user's answer to a completed `ask` cycle.
    pub fn resolve_cycle_completion(&mut self, choice: CycleChoice) {
        if !self.decision_pending {
            return;
        }
        self.decision_pending = false;
        match choice {
            CycleChoice::Repeat => self.restart_cycle(),
            CycleChoice::Stop => self.exit_to_free_mode(),
        }
    }

    /// Selects a free-mode interval.
    ///
    /// Asks first when this would abandon a running timer or an active cycle.
    pub fn switch_interval(&mut self, index: usize) -> Result<(), AppError> {
        if self.awaiting_user() {
            return Ok(());
        }
        let target = self
            .preferences
            .intervals
            .get(index)
            .ok_or(AppError::UnknownInterval(index))?;

        if self.cycle_run.active {
            let message = format!(
                "You are in an active cycle. Leave the cycle and switch to {}?",
                target.label
            );
            self.request(message, DeferredAction::SwitchInterval(index));
        } else if self.state.is_running() {
            let message = format!("Timer is running. Stop it and switch to {}?", target.label);
            self.request(message, DeferredAction::SwitchInterval(index));
        } else {
            self.apply(DeferredAction::SwitchInterval(index));
        }
        Ok(())
    }

    /// Enters cycle mode at the first step, asking first if a timer is running.
    pub fn start_cycle(&mut self, id: &str) -> Result<(), AppError> {
        if self.awaiting_user() {
            return Ok(());
        }
        let cycle = self
            .find_cycle(id)
            .ok_or_else(|| AppError::UnknownCycle(id.to_string()))?;

        if self.state.is_running() {
            let message = format!("Stop the current timer and start the {} cycle?", cycle.name);
            self.request(message, DeferredAction::StartCycle(id.to_string()));
        } else {
            self.apply(DeferredAction::StartCycle(id.to_string()));
        }
        Ok(())
    }

    /// Asks to move on to the next step without credit for the current one.
    pub fn skip_step(&mut self) -> Result<(), AppError> {
        if self.awaiting_user() {
            return Ok(());
        }
        if !self.cycle_run.active {
            return Err(AppError::NotInCycle);
        }
        self.request(
            "Skip this step and move on to the next one?".to_string(),
            DeferredAction::SkipStep,
        );
        Ok(())
    }

    /// Asks to leave the active cycle for the previously selected free interval.
    pub fn exit_cycle(&mut self) -> Result<(), AppError> {
        if self.awaiting_user() {
            return Ok(());
        }
        let name = self
            .active_cycle()
            .map(|c| c.name.clone())
            .ok_or(AppError::NotInCycle)?;
        self.request(format!("Leave the {name} cycle?"), DeferredAction::ExitCycle);
        Ok(())
    }

    fn request(&mut self, message: String, action: DeferredAction) {
        debug!(?action, "confirmation requested");
        self.pending = Some(PendingConfirmation { message, action });
    }

    /// Applies the pending transition, if any.
    pub fn confirm(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.apply(pending.action);
        }
    }

    /// Discards the pending transition, if any.
    pub fn reject(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(action = ?pending.action, "confirmation rejected");
        }
    }

    fn apply(&mut self, action: DeferredAction) {
        match action {
            DeferredAction::SwitchInterval(index) => {
                if index >= self.preferences.intervals.len() {
                    return;
                }
                self.free_index = index;
                self.exit_to_free_mode();
            }
            DeferredAction::StartCycle(id) => {
                let Some(cycle) = self.find_cycle(&id) else {
                    return;
                };
                let total_secs = cycle.steps[0].total_secs();
                info!(cycle = %cycle.name, "starting cycle");
                self.cycle_run = CycleRun {
                    active: true,
                    cycle_id: id,
                    step_index: 0,
                };
                self.state = TimerState::running(total_secs);
                self.sync_ticker(true);
            }
            DeferredAction::SkipStep => {
                if self.cycle_run.active && !self.decision_pending {
                    self.advance_cycle(self.cycle_run.step_index + 1);
                }
            }
            DeferredAction::ExitCycle => self.exit_to_free_mode(),
        }
    }

    /// Keeps the ticker armed exactly while the countdown runs.
    /// `restart` forces a fresh generation when a new interval was loaded.
    fn sync_ticker(&mut self, restart: bool) {
        if self.state.is_running() {
            if restart || !self.ticker.is_active() {
                self.ticker.start();
            }
        } else if self.ticker.is_active() {
            self.ticker.stop();
        }
    }

    pub fn set_user_name(&mut self, name: &str) {
        let name = name.trim();
        self.preferences.user_name = if name.is_empty() {
            DEFAULT_USER_NAME.to_string()
        } else {
            name.to_string()
        };
        self.persist_preferences();
    }

    pub fn toggle_dark_mode(&mut self) {
        self.preferences.dark_mode = !self.preferences.dark_mode;
        self.persist_preferences();
    }

    pub fn set_sound(&mut self, sound: SoundChoice) {
        self.preferences.sound = sound;
        self.persist_preferences();
    }

    /// Updates a free-mode interval. Minutes are clamped to the allowed range.
    ///
    /// A label that is blank after trimming is refused and nothing changes.
    pub fn update_interval(
        &mut self,
        index: usize,
        label: Option<&str>,
        minutes: Option<u32>,
    ) -> Result<(), AppError> {
        let label = label.map(str::trim);
        if label.is_some_and(str::is_empty) {
            return Err(AppError::EmptyLabel);
        }
        let interval = self
            .preferences
            .intervals
            .get_mut(index)
            .ok_or(AppError::UnknownInterval(index))?;

        if let Some(label) = label {
            interval.label = label.to_string();
        }
        if let Some(minutes) = minutes {
            interval.minutes = clamp_minutes(minutes);
        }
        self.persist_preferences();

        if !self.cycle_run.active && index == self.free_index && self.state.is_idle() {
            self.state = TimerState::idle(self.current_interval().total_secs());
        }
        Ok(())
    }

    /// Saves a draft as a user cycle: replaces the cycle with the same id, or appends.
    /// Returns the saved cycle's id.
    pub fn save_cycle(&mut self, draft: &CycleDraft) -> Result<String, AppError> {
        let cycle = draft.build()?;
        if is_builtin_cycle(&cycle.id) {
            return Err(CycleError::BuiltIn(cycle.id).into());
        }

        let id = cycle.id.clone();
        let step_count = cycle.steps.len();
        match self.preferences.cycles.iter_mut().find(|c| c.id == id) {
            Some(existing) => *existing = cycle,
            None => self.preferences.cycles.push(cycle),
        }
        self.persist_preferences();
        info!(cycle_id = %id, "cycle saved");

        if self.cycle_run.active && self.cycle_run.cycle_id == id {
            if self.cycle_run.step_index >= step_count {
                self.pending = None;
                self.exit_to_free_mode();
            } else if self.state.is_idle() {
                self.state = TimerState::idle(self.current_interval().total_secs());
            }
        }
        Ok(id)
    }

    /// Removes a user cycle. Built-in cycles cannot be deleted.
    pub fn delete_cycle(&mut self, id: &str) -> Result<(), AppError> {
        if is_builtin_cycle(id) {
            return Err(CycleError::BuiltIn(id.to_string()).into());
        }
        let position = self
            .preferences
            .cycles
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| CycleError::NotFound(id.to_string()))?;

        self.preferences.cycles.remove(position);
        self.persist_preferences();
        info!(cycle_id = %id, "cycle deleted");

        if self.cycle_run.cycle_id == id {
            if self.cycle_run.active {
                self.pending = None;
                self.exit_to_free_mode();
            }
            self.cycle_run.cycle_id = CycleRun::default().cycle_id;
        }
        Ok(())
    }

    fn persist_preferences(&self) {
        if let Err(e) = persistence::save_preferences(self.store.as_ref(), &self.preferences) {
            warn!(error = %e, "failed to save preferences");
        }
    }

    fn persist_statistics(&self) {
        if let Err(e) = persistence::save_statistics(self.store.as_ref(), &self.statistics) {
            warn!(error = %e, "failed to save statistics");
        }
    }
}
