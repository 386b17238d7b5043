use colored::{ColoredString, Colorize};
use orchestrator::{NodeState, ResourceStatus};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// State rendering
// ============================================================================

/// Marker for a node state
pub fn state_icon(state: NodeState) -> ColoredString {
    match state {
        NodeState::Ready => "✓".green(),
        NodeState::Failed => "✗".red(),
        NodeState::Drifted => "≠".yellow(),
        NodeState::Pending => "·".dimmed(),
        NodeState::Creating | NodeState::Polling | NodeState::Blocked => "…".blue(),
    }
}

/// Colored label for a node state
pub fn state_label(state: NodeState) -> ColoredString {
    let label = state.to_string();
    match state {
        NodeState::Ready => label.green(),
        NodeState::Failed => label.red(),
        NodeState::Drifted => label.yellow(),
        NodeState::Pending => label.dimmed(),
        _ => label.blue(),
    }
}

/// Colored label for an observed status, `unknown` when the query failed
pub fn status_label(status: Option<ResourceStatus>) -> ColoredString {
    match status {
        Some(ResourceStatus::Ready) => "ready".green(),
        Some(ResourceStatus::NotReady) => "not ready".yellow(),
        Some(ResourceStatus::Error) => "error".red(),
        Some(ResourceStatus::WaitingForUpgrade) => "waiting for upgrade".yellow(),
        None => "unknown".dimmed(),
    }
}

/// Pad a key so state columns line up
pub fn pad(key: &str, width: usize) -> String {
    format!("{key:<width$}")
}

/// Width of the longest key
pub fn key_width<'a>(keys: impl IntoIterator<Item = &'a str>) -> usize {
    keys.into_iter().map(|k| k.chars().count()).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad() {
        assert_eq!(pad("pod/a", 8), "pod/a   ");
        assert_eq!(pad("deployment/web", 4), "deployment/web");
    }

    #[test]
    fn test_key_width() {
        assert_eq!(key_width(["pod/a", "service/web"]), 11);
        assert_eq!(key_width(Vec::<&str>::new()), 0);
    }

    #[test]
    fn test_state_label_text() {
        colored::control::set_override(false);
        assert_eq!(state_label(NodeState::Drifted).to_string(), "waiting for upgrade");
        assert_eq!(status_label(None).to_string(), "unknown");
        assert_eq!(state_icon(NodeState::Ready).to_string(), "✓");
    }
}
