//! Terminal rendering of the search results list.
//!
//! Colored output, icons, a loading spinner and unicode-aware truncation.
//! The `format_*` helpers return plain text; the `print_*` functions add
//! styling and write to stdout.

use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::time::Duration;

use crate::models::{BookRecord, Provider};
use crate::view::{EmptyState, ListView, ResultsView};

/// Get the current terminal width.
pub fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(100)
}

/// Check if stdout is a terminal.
pub fn is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

/// Icon for a book provider.
pub fn provider_icon(provider: &Provider) -> &'static str {
    match provider {
        Provider::OpenLibrary => "📚",
        Provider::Kakao => "📗",
        Provider::Other(_) => "📖",
    }
}

/// Status icons for different operations.
pub fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Success => "✓",
        Status::Error => "✗",
        Status::Warning => "⚠",
        Status::Info => "ℹ",
        Status::Loading => "◐",
        Status::Search => "🔍",
    }
}

/// Status types for colored output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
    Loading,
    Search,
}

/// Print a styled status message.
pub fn print_status(status: Status, msg: &str) {
    let icon = status_icon(status);
    match status {
        Status::Success => println!("{} {}", icon.green().bold(), msg),
        Status::Error => println!("{} {}", icon.red().bold(), msg),
        Status::Warning => println!("{} {}", icon.yellow().bold(), msg),
        Status::Info => println!("{} {}", icon.cyan().bold(), msg),
        Status::Loading => println!("{} {}", icon.cyan(), msg),
        Status::Search => println!("{} {}", icon.yellow(), msg),
    }
}

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", format!("━━━ {} ━━━", title).bold().cyan());
}

/// Format a number with commas.
pub fn format_number(n: usize) -> String {
    n.to_string()
        .chars()
        .rev()
        .collect::<Vec<_>>()
        .chunks(3)
        .map(|c| c.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(",")
        .chars()
        .rev()
        .collect()
}

/// Truncate text to fit within the specified width using unicode-aware truncation.
pub fn truncate_with_ellipsis(text: &str, max_width: usize) -> String {
    if max_width <= 3 {
        return "...".to_string();
    }

    // Hangul and CJK titles take two columns per character
    let char_widths: Vec<(char, usize)> = text
        .chars()
        .map(|c| (c, unicode_width::UnicodeWidthChar::width(c).unwrap_or(1)))
        .collect();

    let total_width: usize = char_widths.iter().map(|(_, w)| *w).sum();
    if total_width <= max_width {
        return text.to_string();
    }

    let mut current_width = 0;
    let mut end_idx = 0;
    for (i, (_, w)) in char_widths.iter().enumerate() {
        if current_width + w > max_width - 3 {
            break;
        }
        current_width += w;
        end_idx = i + 1;
    }

    if end_idx == 0 {
        return "...".to_string();
    }

    let truncated: String = char_widths[..end_idx].iter().map(|(c, _)| *c).collect();
    format!("{}...", truncated)
}

/// Secondary line of a book row: authors, publisher and year
pub fn format_book_details(book: &BookRecord) -> String {
    let mut parts = Vec::new();
    if !book.authors.is_empty() {
        parts.push(book.author_line());
    }
    if let Some(publisher) = book.publisher.as_deref().filter(|p| !p.is_empty()) {
        parts.push(publisher.to_string());
    }
    if let Some(year) = book.year() {
        parts.push(year.to_string());
    }
    if parts.is_empty() {
        "Unknown author".to_string()
    } else {
        parts.join(" · ")
    }
}

/// One numbered row, truncated to `width` columns. Numbers start at 1.
pub fn format_book_row(index: usize, book: &BookRecord, width: usize) -> String {
    let prefix = format!("{:>3}. ", index + 1);
    let title = truncate_with_ellipsis(&book.title, width.saturating_sub(prefix.len()));
    format!("{}{}", prefix, title)
}

fn print_list(list: &ListView<'_>, total: Option<usize>) {
    let width = terminal_width();

    print_section(list.title);
    if let Some(total) = total {
        println!(
            "{}",
            format!("{} shown of {}", list.items.len(), format_number(total)).dimmed()
        );
    }

    for (index, book) in list.items.iter().enumerate() {
        let row = format_book_row(index, book, width.saturating_sub(3));
        println!("{} {}", provider_icon(&book.provider), row.bold());
        println!(
            "        {}",
            truncate_with_ellipsis(&format_book_details(book), width.saturating_sub(8)).dimmed()
        );
    }

    if list.loading {
        println!("{} {}", status_icon(Status::Loading).cyan(), "Loading...".dimmed());
    } else if list.sentinel.is_some() {
        println!("{}", "  ↓ more results".dimmed());
    }
}

fn print_empty(empty: &EmptyState) {
    println!();
    println!("  {}", empty.message.bright_black());
    println!("  {}", format!("[{}]", empty.illustration_alt).dimmed());
    println!();
    println!("  {} {}", "[m]".cyan().bold(), empty.button_label.bold());
}

/// Draw a rendered results view. `total` is the provider's match count, if known.
pub fn print_results_view(view: &ResultsView<'_>, total: Option<usize>) {
    match view {
        ResultsView::List(list) => print_list(list, total),
        ResultsView::Empty(empty) => print_empty(empty),
    }
}

/// Loading spinner shown while a page is fetched.
pub struct Spinner {
    pb: indicatif::ProgressBar,
}

impl Spinner {
    /// Create a new spinner with the given message.
    pub fn new(msg: &str) -> Self {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_style(Self::style("{spinner:.cyan} {msg}", "⠁⠂⠄⡀⢀⠠⠐⠈ "));
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb }
    }

    /// A spinner that draws nothing, for non-terminal output.
    pub fn hidden() -> Self {
        Self {
            pb: indicatif::ProgressBar::hidden(),
        }
    }

    fn style(template: &str, ticks: &str) -> indicatif::ProgressStyle {
        indicatif::ProgressStyle::with_template(template)
            .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner())
            .tick_chars(ticks)
    }

    /// Finish with error message.
    pub fn finish_with_error(&self, msg: &str) {
        self.pb.set_style(Self::style("{spinner:.red} {msg}", "✗ "));
        self.pb.finish_with_message(msg.to_string());
    }

    /// Remove the spinner from the terminal.
    pub fn clear(&self) {
        self.pb.finish_and_clear();
    }
}
