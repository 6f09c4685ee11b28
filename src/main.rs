//! Pomoquest - a Pomodoro timer with cycles, streaks and achievements.
//!
//! `run` starts the interactive timer in the terminal. The other subcommands
//! inspect progress and edit cycles and preferences in the same store.

use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod audio;
mod editor;
mod event;
mod models;
mod notifications;
mod persistence;
mod progress;
mod timer;

use app::{App, CompletionEvent};
use audio::AudioPlayer;
use editor::{CycleDraft, MoveDirection};
use event::{EventResult, LoopMessage};
use models::{FinishPolicy, Interval, SoundChoice};
use persistence::{MemoryStore, SqliteStore, Store, StoreError};
use progress::ChartRange;
use timer::{DetachedTicker, ThreadTicker};

#[derive(Parser)]
#[command(name = "pomoquest")]
#[command(about = "Pomodoro timer with cycles, levels and achievements")]
#[command(version)]
struct Cli {
    /// Database file (defaults to the platform data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Keep everything in memory; nothing is saved
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive timer (default)
    Run {
        /// Start this cycle right away
        #[arg(short, long)]
        cycle: Option<String>,

        /// Don't show desktop notifications
        #[arg(long)]
        no_notify: bool,
    },

    /// Show level, totals, a work chart and achievements
    Stats {
        /// Chart range: day, week or month
        #[arg(short, long, default_value = "week")]
        range: ChartRange,
    },

    /// Manage cycles
    Cycles {
        #[command(subcommand)]
        action: CycleCommand,
    },

    /// Show or change preferences
    Prefs {
        #[command(subcommand)]
        action: Option<PrefsCommand>,
    },
}

#[derive(Subcommand)]
enum CycleCommand {
    /// List built-in and custom cycles
    List,

    /// Create a cycle from steps like `work:25 short long:15`
    Create {
        name: String,

        /// Steps as interval id with optional minutes
        #[arg(required = true)]
        steps: Vec<String>,

        #[arg(short, long)]
        emoji: Option<String>,

        /// What happens after the last step: stop, repeat or ask
        #[arg(short, long, default_value = "ask")]
        on_finish: FinishPolicy,
    },

    /// Change a custom cycle
    Edit {
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        emoji: Option<String>,

        #[arg(short, long)]
        on_finish: Option<FinishPolicy>,

        /// Replace all steps
        #[arg(short, long, num_args = 1..)]
        steps: Vec<String>,

        #[command(flatten)]
        step_edits: StepEdits,
    },

    /// Delete a custom cycle
    Delete { id: String },
}

/// Single-step changes, applied in the order listed after `--steps`.
/// Positions are 1-based.
#[derive(Args, Default)]
struct StepEdits {
    /// Replace one step's interval, e.g. `2=short:10`
    #[arg(long, value_name = "N=STEP")]
    set: Vec<String>,

    /// Change one step's minutes, e.g. `1=45`
    #[arg(long, value_name = "N=MINUTES")]
    minutes: Vec<String>,

    /// Append a step
    #[arg(long, value_name = "STEP")]
    add: Vec<String>,

    /// Remove a step
    #[arg(long, value_name = "N")]
    remove: Option<usize>,

    /// Move a step one place earlier
    #[arg(long, value_name = "N")]
    up: Option<usize>,

    /// Move a step one place later
    #[arg(long, value_name = "N")]
    down: Option<usize>,
}

#[derive(Subcommand)]
enum PrefsCommand {
    /// Print all preferences
    Show,

    /// Set the display name (blank resets it)
    Name { name: String },

    /// Choose the completion sound: bell, digital, soft or none
    Sound { sound: SoundChoice },

    /// Toggle dark mode
    Dark,

    /// Change a free-mode interval
    Interval {
        /// 1-based position
        position: usize,

        #[arg(short, long)]
        label: Option<String>,

        #[arg(short, long)]
        minutes: Option<u32>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pomoquest=info")),
        )
        .init();

    let cli = Cli::parse();
    let store = open_store(&cli)?;

    match cli.command.unwrap_or(Commands::Run {
        cycle: None,
        no_notify: false,
    }) {
        Commands::Run { cycle, no_notify } => run(store, cycle, !no_notify),
        Commands::Stats { range } => {
            let app = App::new(store, Box::new(DetachedTicker::new()));
            print_stats(&app, range);
            Ok(())
        }
        Commands::Cycles { action } => {
            let mut app = App::new(store, Box::new(DetachedTicker::new()));
            run_cycle_command(&mut app, action)
        }
        Commands::Prefs { action } => {
            let mut app = App::new(store, Box::new(DetachedTicker::new()));
            run_prefs_command(&mut app, action.unwrap_or(PrefsCommand::Show))
        }
    }
}

fn open_store(cli: &Cli) -> Result<Box<dyn Store>, StoreError> {
    if cli.ephemeral {
        return Ok(Box::new(MemoryStore::new()));
    }
    let store = match &cli.db {
        Some(path) => SqliteStore::open(path)?,
        None => SqliteStore::open_default()?,
    };
    Ok(Box::new(store))
}

/// Runs the interactive timer until `quit` or end of input.
fn run(store: Box<dyn Store>, cycle: Option<String>, notify: bool) -> Result<(), Box<dyn Error>> {
    let (tx, rx) = mpsc::channel();

    let ticker = ThreadTicker::new(tx.clone(), Duration::from_secs(1), LoopMessage::Tick);
    let mut app = App::new(store, Box::new(ticker));

    // Audio is created on the main thread to avoid Send issues
    let audio = match AudioPlayer::new() {
        Ok(player) => Some(player),
        Err(e) => {
            warn!(error = %e, "audio unavailable");
            None
        }
    };

    spawn_input_reader(tx);

    info!(user = %app.preferences.user_name, "starting timer");
    println!("Hi {}! {}", app.preferences.user_name, event::HELP);

    if let Some(id) = cycle {
        app.start_cycle(&id)?;
    }
    print_status(&app);

    for message in rx {
        match message {
            LoopMessage::Tick(generation) => {
                if app.on_timer_fired(generation) {
                    print_title(&app);
                }
            }
            LoopMessage::Line(line) => match event::handle_line(&mut app, &line) {
                EventResult::Quit => break,
                EventResult::StateChanged | EventResult::ShowStatus => print_status(&app),
                EventResult::ShowHelp => println!("{}", event::HELP),
                EventResult::Rejected(reason) => println!("{reason}"),
            },
            LoopMessage::InputClosed => break,
        }

        let events = app.take_events();
        if !events.is_empty() {
            handle_completions(&app, &events, audio.as_ref(), notify);
            print_status(&app);
        }
    }

    Ok(())
}

fn spawn_input_reader(tx: Sender<LoopMessage>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(LoopMessage::Line(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(LoopMessage::InputClosed);
    });
}

fn handle_completions(
    app: &App,
    events: &[CompletionEvent],
    audio: Option<&AudioPlayer>,
    notify: bool,
) {
    for event in events {
        let (summary, body) = notifications::message_for(event);
        println!("\n{summary} {body}");
        if notify {
            notifications::notify(event);
        }
    }

    if let (Some(audio), Some(sound)) = (audio, completion_sound(app.preferences.sound, events)) {
        audio.play(sound);
    }
}

/// The cue for a batch of completions. One cue covers a step and the cycle it finished.
fn completion_sound(sound: SoundChoice, events: &[CompletionEvent]) -> Option<SoundChoice> {
    if events.is_empty() || sound == SoundChoice::None {
        return None;
    }
    Some(sound)
}

fn print_title(app: &App) {
    print!("\r\x1b[2K{}", app.window_title());
    let _ = io::stdout().flush();
}

fn print_status(app: &App) {
    let interval = app.current_interval();
    let mode = match app.active_cycle() {
        Some(cycle) => format!(
            "{} {} step {}/{}",
            cycle.emoji,
            cycle.name,
            app.cycle_run.step_index + 1,
            cycle.steps.len()
        ),
        None => "free mode".to_string(),
    };

    println!(
        "\n[{}] {} {} ({:.0}%)",
        mode,
        interval.label,
        timer::format_time(app.state.remaining_secs()),
        app.state.progress_percent() * 100.0
    );

    if let Some(pending) = app.pending_confirmation() {
        println!("{} (yes/no)", pending.message);
    } else if app.cycle_decision_pending() {
        println!("Cycle finished. Repeat it or stop? (repeat/stop)");
    }
    print_title(app);
}

fn xp_bar(progress: f32, width: usize) -> String {
    let filled = ((progress.clamp(0.0, 1.0) * width as f32).round() as usize).min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn print_stats(app: &App, range: ChartRange) {
    let stats = &app.statistics;
    let today = app.today();
    let level = progress::level_status(stats.xp);

    println!("{} — {} {}", app.preferences.user_name, level.current.icon, level.current.name);
    match level.next {
        Some(next) => println!(
            "{} {}/{} XP to {}",
            xp_bar(level.progress, 20),
            level.xp_into_level,
            level.xp_to_advance,
            next.name
        ),
        None => println!("{} {} XP (max level)", xp_bar(1.0, 20), stats.xp),
    }

    println!();
    println!("Total XP:        {}", stats.xp);
    println!("Work intervals:  {}", stats.total_work_intervals);
    println!("Work minutes:    {}", stats.total_work_minutes);
    println!("Today:           {} min", progress::today_minutes(stats, today));
    println!("Streak:          {} days", stats.streak_days);
    println!("Cycles:          {}", stats.completed_cycles);

    println!();
    let bars = progress::chart(stats, today, range);
    let peak = bars.iter().map(|b| b.minutes).max().unwrap_or(0).max(1);
    for bar in &bars {
        let width = (bar.minutes as usize * 30).div_ceil(peak as usize);
        println!("{:>4} {} {}", bar.label, "▇".repeat(width), bar.minutes);
    }

    println!();
    for (achievement, unlocked) in progress::achievement_status(stats, today) {
        let mark = if unlocked { achievement.icon } else { "🔒" };
        println!("{} {:<14} {}", mark, achievement.name, achievement.description);
    }
}

/// Converts a 1-based step position.
fn step_index(position: usize) -> Result<usize, String> {
    position
        .checked_sub(1)
        .ok_or_else(|| "step positions start at 1".to_string())
}

/// Splits `N=VALUE` into a step index and the value.
fn split_position(raw: &str) -> Result<(usize, &str), String> {
    let (position, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected N=VALUE, got '{raw}'"))?;
    let position = position
        .parse::<usize>()
        .map_err(|_| format!("invalid step position in '{raw}'"))?;
    Ok((step_index(position)?, value))
}

fn apply_step_edits(
    app: &App,
    draft: &mut CycleDraft,
    edits: &StepEdits,
) -> Result<(), Box<dyn Error>> {
    for raw in &edits.set {
        let (index, step) = split_position(raw)?;
        draft.set_step_template(index, &parse_step(app, step)?)?;
    }
    for raw in &edits.minutes {
        let (index, minutes) = split_position(raw)?;
        let minutes = minutes
            .parse::<u32>()
            .map_err(|_| format!("invalid minutes in '{raw}'"))?;
        draft.set_step_minutes(index, minutes)?;
    }
    for raw in &edits.add {
        draft.add_step(&parse_step(app, raw)?);
    }
    if let Some(position) = edits.remove {
        draft.remove_step(step_index(position)?)?;
    }
    let moves = [
        (edits.up, MoveDirection::Up),
        (edits.down, MoveDirection::Down),
    ];
    for (position, direction) in moves {
        if let Some(position) = position {
            if !draft.move_step(step_index(position)?, direction) {
                return Err(format!("step {position} cannot move {direction:?}").into());
            }
        }
    }
    Ok(())
}

/// Parses a step like `work` or `short:10` against the free-mode intervals.
fn parse_step(app: &App, raw: &str) -> Result<Interval, String> {
    let (id, minutes) = match raw.split_once(':') {
        Some((id, minutes)) => {
            let minutes = minutes
                .parse::<u32>()
                .map_err(|_| format!("invalid minutes in step '{raw}'"))?;
            (id, Some(minutes))
        }
        None => (raw, None),
    };

    let mut step = app
        .preferences
        .intervals
        .iter()
        .find(|i| i.id == id)
        .cloned()
        .ok_or_else(|| format!("unknown interval '{id}' in step '{raw}'"))?;
    if let Some(minutes) = minutes {
        step.minutes = minutes;
    }
    Ok(step)
}

fn parse_steps(app: &App, raw: &[String]) -> Result<Vec<Interval>, String> {
    raw.iter().map(|s| parse_step(app, s)).collect()
}

fn print_cycles(app: &App) {
    for cycle in app.cycles() {
        let kind = if cycle.is_builtin() { " (built-in)" } else { "" };
        println!(
            "{} {} [{}]{} {} steps, {} min, on finish: {}",
            cycle.emoji,
            cycle.name,
            cycle.id,
            kind,
            cycle.steps.len(),
            cycle.total_minutes(),
            cycle.on_finish
        );
    }
}

fn run_cycle_command(app: &mut App, action: CycleCommand) -> Result<(), Box<dyn Error>> {
    match action {
        CycleCommand::List => print_cycles(app),
        CycleCommand::Create {
            name,
            steps,
            emoji,
            on_finish,
        } => {
            let steps = parse_steps(app, &steps)?;
            let Some((first, rest)) = steps.split_first() else {
                return Err(editor::CycleError::NoSteps.into());
            };

            let mut draft = CycleDraft::new(first);
            for step in rest {
                draft.add_step(step);
            }
            draft.name = name;
            draft.on_finish = on_finish;
            if let Some(emoji) = emoji {
                draft.emoji = emoji;
            }

            let id = app.save_cycle(&draft)?;
            println!("Created cycle {id} ({} min)", draft.total_minutes());
        }
        CycleCommand::Edit {
            id,
            name,
            emoji,
            on_finish,
            steps,
            step_edits,
        } => {
            let cycle = app
                .find_cycle(&id)
                .ok_or_else(|| editor::CycleError::NotFound(id.clone()))?;
            let mut draft = CycleDraft::from_cycle(cycle);

            if let Some(name) = name {
                draft.name = name;
            }
            if let Some(emoji) = emoji {
                draft.emoji = emoji;
            }
            if let Some(policy) = on_finish {
                draft.on_finish = policy;
            }
            if !steps.is_empty() {
                draft.steps = parse_steps(app, &steps)?;
            }
            apply_step_edits(app, &mut draft, &step_edits)?;

            app.save_cycle(&draft)?;
            println!("Updated cycle {id}");
        }
        CycleCommand::Delete { id } => {
            app.delete_cycle(&id)?;
            println!("Deleted cycle {id}");
        }
    }
    Ok(())
}

fn run_prefs_command(app: &mut App, action: PrefsCommand) -> Result<(), Box<dyn Error>> {
    match action {
        PrefsCommand::Show => {
            let prefs = &app.preferences;
            println!("Name:       {}", prefs.user_name);
            println!("Dark mode:  {}", if prefs.dark_mode { "on" } else { "off" });
            println!("Sound:      {}", prefs.sound);
            println!("Intervals:");
            for (position, interval) in prefs.intervals.iter().enumerate() {
                println!(
                    "  {}. {} [{}] {} min",
                    position + 1,
                    interval.label,
                    interval.id,
                    interval.minutes
                );
            }
            println!("Custom cycles: {}", prefs.cycles.len());
        }
        PrefsCommand::Name { name } => {
            app.set_user_name(&name);
            println!("Name set to {}", app.preferences.user_name);
        }
        PrefsCommand::Sound { sound } => {
            app.set_sound(sound);
            println!("Sound set to {sound}");
        }
        PrefsCommand::Dark => {
            app.toggle_dark_mode();
            println!(
                "Dark mode {}",
                if app.preferences.dark_mode { "on" } else { "off" }
            );
        }
        PrefsCommand::Interval {
            position,
            label,
            minutes,
        } => {
            let index = position.checked_sub(1).ok_or("positions start at 1")?;
            app.update_interval(index, label.as_deref(), minutes)?;
            let interval = &app.preferences.intervals[index];
            println!("{}: {} min", interval.label, interval.minutes);
        }
    }
    Ok(())
}
