use console::style;
use std::fmt::Display;

/// Green bold: fixed files, satisfied checks
pub fn success<D: Display>(text: D) -> String {
    style(text).green().bold().to_string()
}

/// Red bold: failed renders, missing interpreters
pub fn failure<D: Display>(text: D) -> String {
    style(text).red().bold().to_string()
}

/// White bold: section headers, titles
pub fn header<D: Display>(text: D) -> String {
    style(text).white().bold().to_string()
}

/// Dim: secondary text, hints, decorative lines
pub fn dim<D: Display>(text: D) -> String {
    style(text).dim().to_string()
}

/// Yellow: shell commands, install hints, warnings
pub fn yellow<D: Display>(text: D) -> String {
    style(text).yellow().to_string()
}

/// Green: paths, package versions, rule ids
pub fn value<D: Display>(text: D) -> String {
    style(text).green().to_string()
}

/// Cyan bold: step numbers, bullet points
pub fn accent<D: Display>(text: D) -> String {
    style(text).cyan().bold().to_string()
}

/// A watcher notification line, as shown by the presenter.
pub fn notification<D: Display>(text: D) -> String {
    format!("{} {}", style("🔔").cyan(), style(text).bold())
}

/// Horizontal rule framing printed code.
pub fn rule() -> String {
    dim("=".repeat(40))
}
