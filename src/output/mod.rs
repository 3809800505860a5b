// Output formatting — terminal tables and progress bars.

pub mod terminal;

use indicatif::{ProgressBar, ProgressStyle};

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Unlike byte slicing (`&text[..40]`), this respects UTF-8 character boundaries
/// and will never panic on multi-byte characters in course or item names.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

/// A progress bar in the house style: `  Label [=====     ] 3/10 (eta)`.
///
/// Hidden automatically when stderr isn't a terminal.
pub fn progress_bar(label: &str, len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let template = format!("  {label} [{{bar:30}}] {{pos}}/{{len}} ({{eta}})");
    if let Ok(style) = ProgressStyle::default_bar().template(&template) {
        pb.set_style(style);
    }
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("Einführung", 4), "Einf...");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
