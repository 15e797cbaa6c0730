//! Best-effort desktop notification.

use std::process::{Command, Stdio};

/// Posts a macOS notification via `osascript` without waiting for it.
///
/// Failures are logged at debug level and otherwise ignored.
pub fn notify(title: &str, message: &str) {
    let script = notification_script(title, message);
    let spawned = Command::new("osascript")
        .args(["-e", &script])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    if let Err(e) = spawned {
        tracing::debug!(error = %e, "Could not send notification");
    }
}

/// Builds the AppleScript `display notification` statement.
fn notification_script(title: &str, message: &str) -> String {
    format!(
        "display notification \"{}\" with title \"{}\"",
        escape(message),
        escape(title)
    )
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
