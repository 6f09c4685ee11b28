//! Cycle authoring.
//!
//! A [`CycleDraft`] is the editable form of a cycle. Minutes are kept as
//! typed while editing and only clamped when the draft is built.

use crate::models::{clamp_minutes, Cycle, FinishPolicy, Interval};
use thiserror::Error;

/// Emojis offered for new cycles.
pub const EMOJI_CHOICES: [&str; 10] = ["🍅", "⚡", "📚", "💼", "🎯", "🧘", "💻", "🎨", "🏋️", "🔬"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CycleError {
    #[error("cycle name must not be empty")]
    EmptyName,
    #[error("cycle must have at least one step")]
    NoSteps,
    #[error("cannot remove the last step of a cycle")]
    LastStep,
    #[error("step {0} does not exist")]
    StepOutOfRange(usize),
    #[error("built-in cycle '{0}' cannot be changed")]
    BuiltIn(String),
    #[error("no cycle with id '{0}'")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleDraft {
    /// Set when editing an existing cycle.
    pub id: Option<String>,
    pub name: String,
    pub emoji: String,
    pub steps: Vec<Interval>,
    pub on_finish: FinishPolicy,
}

impl CycleDraft {
    /// Starts a new cycle with a single step copied from `first_step`.
    pub fn new(first_step: &Interval) -> Self {
        Self {
            id: None,
            name: String::new(),
            emoji: EMOJI_CHOICES[0].to_string(),
            steps: vec![first_step.clone()],
            on_finish: FinishPolicy::Ask,
        }
    }

    pub fn from_cycle(cycle: &Cycle) -> Self {
        Self {
            id: Some(cycle.id.clone()),
            name: cycle.name.clone(),
            emoji: cycle.emoji.clone(),
            steps: cycle.steps.clone(),
            on_finish: cycle.on_finish,
        }
    }

    pub fn add_step(&mut self, template: &Interval) {
        self.steps.push(template.clone());
    }

    pub fn remove_step(&mut self, index: usize) -> Result<(), CycleError> {
        if index >= self.steps.len() {
            return Err(CycleError::StepOutOfRange(index));
        }
        if self.steps.len() == 1 {
            return Err(CycleError::LastStep);
        }
        self.steps.remove(index);
        Ok(())
    }

    /// Swaps a step with its neighbour. Returns false at either edge.
    pub fn move_step(&mut self, index: usize, direction: MoveDirection) -> bool {
        let target = match direction {
            MoveDirection::Up => index.checked_sub(1),
            MoveDirection::Down => Some(index + 1),
        };
        match target {
            Some(target) if index < self.steps.len() && target < self.steps.len() => {
                self.steps.swap(index, target);
                true
            }
            _ => false,
        }
    }

    /// Replaces a step with another interval template, taking its label, color and minutes.
    pub fn set_step_template(&mut self, index: usize, template: &Interval) -> Result<(), CycleError> {
        let step = self
            .steps
            .get_mut(index)
            .ok_or(CycleError::StepOutOfRange(index))?;
        *step = template.clone();
        Ok(())
    }

    pub fn set_step_minutes(&mut self, index: usize, minutes: u32) -> Result<(), CycleError> {
        let step = self
            .steps
            .get_mut(index)
            .ok_or(CycleError::StepOutOfRange(index))?;
        step.minutes = minutes;
        Ok(())
    }

    pub fn total_minutes(&self) -> u32 {
        self.steps.iter().map(|s| s.minutes).sum()
    }

    pub fn validate(&self) -> Result<(), CycleError> {
        if self.name.trim().is_empty() {
            return Err(CycleError::EmptyName);
        }
        if self.steps.is_empty() {
            return Err(CycleError::NoSteps);
        }
        Ok(())
    }

    /// Validates the draft and produces the cycle to save.
    pub fn build(&self) -> Result<Cycle, CycleError> {
        self.validate()?;

        let steps = self
            .steps
            .iter()
            .map(|s| Interval {
                minutes: clamp_minutes(s.minutes),
                ..s.clone()
            })
            .collect();

        Ok(Cycle {
            id: self
                .id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string()),
            name: self.name.trim().to_string(),
            emoji: self.emoji.clone(),
            steps,
            on_finish: self.on_finish,
        })
    }
}
