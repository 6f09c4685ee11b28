//! Input event handling.
//!
//! The run loop receives ticks and input lines on one channel. Each line is
//! parsed into a [`Command`] and dispatched to the [`App`].

use crate::app::{App, AppError, CycleChoice};
use thiserror::Error;
use tracing::debug;

/// Messages delivered to the run loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopMessage {
    /// The ticker fired for the given generation.
    Tick(u64),
    /// A line typed by the user.
    Line(String),
    /// Standard input reached end of file.
    InputClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Toggle,
    Reset,
    Skip,
    ExitCycle,
    /// Switches to the free-mode interval at a 1-based position.
    Mode(usize),
    Cycle(String),
    Yes,
    No,
    Repeat,
    Stop,
    Status,
    Help,
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}', type 'help' for a list")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("'{0}' is not a valid position")]
    InvalidPosition(String),
}

pub const HELP: &str = "\
commands:
  start | pause | toggle | reset   control the timer (empty line toggles)
  mode <n>                         switch to free interval n
  cycle <id>                       start a cycle
  skip | exit                      skip a step or leave the cycle
  yes | no                         answer a confirmation
  repeat | stop                    answer a finished cycle
  status | help | quit";

/// Result of handling an input line.
#[derive(Debug, Clone, PartialEq)]
pub enum EventResult {
    /// User requested quit.
    Quit,
    /// State changed, status needs to be shown again.
    StateChanged,
    ShowStatus,
    ShowHelp,
    /// The line could not be carried out.
    Rejected(String),
}

/// Parses a line of input. A blank line toggles the timer.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(Command::Toggle);
    };
    let argument = words.next();

    let command = match head.to_lowercase().as_str() {
        "start" | "s" => Command::Start,
        "pause" | "p" => Command::Pause,
        "toggle" | "t" => Command::Toggle,
        "reset" | "r" => Command::Reset,
        "skip" => Command::Skip,
        "exit" => Command::ExitCycle,
        "mode" | "m" => {
            let raw = argument.ok_or(CommandError::MissingArgument("mode"))?;
            match raw.parse::<usize>() {
                Ok(position) if position > 0 => Command::Mode(position),
                _ => return Err(CommandError::InvalidPosition(raw.to_string())),
            }
        }
        "cycle" | "c" => {
            let id = argument.ok_or(CommandError::MissingArgument("cycle"))?;
            Command::Cycle(id.to_string())
        }
        "yes" | "y" => Command::Yes,
        "no" | "n" => Command::No,
        "repeat" => Command::Repeat,
        "stop" => Command::Stop,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "q" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(command)
}

/// Handles an input line and updates the app state accordingly.
pub fn handle_line(app: &mut App, line: &str) -> EventResult {
    match parse_command(line) {
        Ok(command) => handle_command(app, command),
        Err(e) => EventResult::Rejected(e.to_string()),
    }
}

pub fn handle_command(app: &mut App, command: Command) -> EventResult {
    debug!(?command, "handling command");

    let outcome: Result<(), AppError> = match command {
        Command::Start => {
            app.start();
            Ok(())
        }
        Command::Pause => {
            app.pause();
            Ok(())
        }
        Command::Toggle => {
            app.toggle();
            Ok(())
        }
        Command::Reset => {
            app.reset();
            Ok(())
        }
        Command::Skip => app.skip_step(),
        Command::ExitCycle => app.exit_cycle(),
        Command::Mode(position) => app.switch_interval(position - 1),
        Command::Cycle(id) => app.start_cycle(&id),
        Command::Yes => {
            app.confirm();
            Ok(())
        }
        Command::No => {
            app.reject();
            Ok(())
        }
        Command::Repeat => {
            app.resolve_cycle_completion(CycleChoice::Repeat);
            Ok(())
        }
        Command::Stop => {
            app.resolve_cycle_completion(CycleChoice::Stop);
            Ok(())
        }
        Command::Status => return EventResult::ShowStatus,
        Command::Help => return EventResult::ShowHelp,
        Command::Quit => return EventResult::Quit,
    };

    match outcome {
        Ok(()) => EventResult::StateChanged,
        Err(e) => EventResult::Rejected(e.to_string()),
    }
}
