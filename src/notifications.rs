//! Desktop notifications for completion events.

use crate::app::CompletionEvent;
use crate::models::FinishPolicy;
use notify_rust::Notification;
use std::thread;
use tracing::warn;

/// Summary and body shown for a completion event.
pub fn message_for(event: &CompletionEvent) -> (String, String) {
    match event {
        CompletionEvent::IntervalComplete {
            label,
            work,
            xp_gained,
        } => {
            let summary = format!("{label} complete! 🍅");
            let body = if *work {
                format!("+{xp_gained} XP. Time for a break.")
            } else {
                format!("+{xp_gained} XP. Ready to focus again?")
            };
            (summary, body)
        }
        CompletionEvent::CycleComplete { name, policy } => {
            let summary = format!("{name} cycle complete! 🎉");
            let body = match policy {
                FinishPolicy::Repeat => "Starting over from the first step.",
                FinishPolicy::Stop => "Back to free mode.",
                FinishPolicy::Ask => "Repeat the cycle or stop here?",
            };
            (summary, body.to_string())
        }
    }
}

/// Shows a notification for `event`.
/// Runs in a background thread to avoid blocking.
pub fn notify(event: &CompletionEvent) {
    let (summary, body) = message_for(event);
    thread::spawn(move || {
        if let Err(e) = Notification::new()
            .summary(&summary)
            .body(&body)
            .sound_name("default")
            .show()
        {
            warn!(error = %e, "failed to show notification");
        }
    });
}
