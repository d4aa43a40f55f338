use std::future::Future;
use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Result};
use atty::Stream;
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use pastegate_common::confirm::{ViewState, ARM_WINDOW};
use pastegate_common::estimate::RemainingViews;
use pastegate_common::PasteView;

/// Shows a spinner on stderr while `fut` is pending.
pub async fn with_spinner<F: Future>(message: &'static str, fut: F) -> F::Output {
    // Only print the spinner on interactive, else it messes with output
    let spinner = if atty::is(Stream::Stderr) {
        ProgressBar::new_spinner()
    } else {
        ProgressBar::hidden()
    };
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));

    let output = fut.await;
    spinner.finish_and_clear();
    output
}

/// Reports the view state to the user. Returns whether the paste was shown.
pub fn render_state(state: &ViewState, estimate: Option<RemainingViews>) -> Result<bool> {
    match state {
        ViewState::Idle => {
            eprintln!("Confirmation window elapsed. Press Enter to arm again.");
            Ok(false)
        }
        ViewState::Armed { .. } => {
            let remaining = estimate.map_or_else(String::new, |remaining| format!(" ({})", remaining));
            eprintln!(
                "Viewing spends one view of this paste{}. Press Enter within {} seconds to confirm.",
                remaining,
                ARM_WINDOW.as_secs()
            );
            Ok(false)
        }
        ViewState::Fetching { .. } => Ok(false),
        ViewState::Displayed { view, .. } => {
            render_view(view, estimate.unwrap_or_else(|| view.remaining()))?;
            Ok(true)
        }
        ViewState::Unavailable { error, .. } => bail!("{}", error),
    }
}

fn render_view(view: &PasteView, remaining: RemainingViews) -> Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(view.content.as_bytes())?;

    // Piped output is left byte-for-byte intact.
    if atty::is(Stream::Stdout) && !view.content.ends_with('\n') {
        writeln!(stdout)?;
    }
    stdout.flush()?;

    eprintln!("{}.", capitalize(&remaining.to_string()));
    eprintln!("{}", expiration_text(view.expires_at));
    Ok(())
}

pub fn times(remaining: RemainingViews) -> String {
    match remaining {
        RemainingViews::Finite(1) => "once".to_string(),
        RemainingViews::Finite(n) => format!("{} times", n),
        RemainingViews::Unlimited => "any number of times".to_string(),
    }
}

fn expiration_text(expires_at: Option<DateTime<Utc>>) -> String {
    expires_at.map_or_else(
        || "This paste will not expire.".to_string(),
        |time| {
            time.format("This paste will expire on %A, %B %-d, %Y at %T %Z.")
                .to_string()
        },
    )
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
