//! Terminal progress output for a sync run.
//!
//! Colors are used only on a TTY and never when `NO_COLOR` is set.

use std::io::{self, IsTerminal};

const RESET: &str = "\x1b[0m";

/// ANSI attributes used by the console.
#[derive(Debug, Clone, Copy)]
enum Style {
    Bold,
    Dim,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
}

impl Style {
    fn code(self) -> &'static str {
        match self {
            Style::Bold => "1",
            Style::Dim => "2",
            Style::Green => "32",
            Style::Yellow => "33",
            Style::Blue => "34",
            Style::Magenta => "35",
            Style::Cyan => "36",
        }
    }
}

/// Kind of a one-line message, shown as a bracketed tag.
#[derive(Debug, Clone, Copy)]
enum Tag {
    Info,
    Ok,
    Warn,
    Step,
}

impl Tag {
    fn text(self) -> &'static str {
        match self {
            Tag::Info => "INFO",
            Tag::Ok => "OK",
            Tag::Warn => "WARN",
            Tag::Step => "STEP",
        }
    }

    fn color(self) -> Style {
        match self {
            Tag::Info => Style::Blue,
            Tag::Ok => Style::Green,
            Tag::Warn => Style::Yellow,
            Tag::Step => Style::Cyan,
        }
    }
}

/// User-facing output. Observes the run, never steers it.
#[derive(Debug)]
pub struct Console {
    colors_enabled: bool,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    /// Detects color support from `NO_COLOR` and whether stdout is a TTY.
    pub fn new() -> Self {
        Self::with_colors(std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal())
    }

    pub fn with_colors(enabled: bool) -> Self {
        Self {
            colors_enabled: enabled,
        }
    }

    fn paint(&self, text: &str, styles: &[Style]) -> String {
        if !self.colors_enabled {
            return text.to_string();
        }
        let codes: Vec<&str> = styles.iter().map(|s| s.code()).collect();
        format!("\x1b[{}m{}{}", codes.join(";"), text, RESET)
    }

    fn tagged(&self, tag: Tag, message: &str) -> String {
        format!("[{}] {}", self.paint(tag.text(), &[tag.color(), Style::Bold]), message)
    }

    pub fn info(&self, message: &str) {
        println!("{}", self.tagged(Tag::Info, message));
    }

    pub fn success(&self, message: &str) {
        println!("{}", self.tagged(Tag::Ok, message));
    }

    pub fn warning(&self, message: &str) {
        println!("{}", self.tagged(Tag::Warn, message));
    }

    pub fn step(&self, message: &str) {
        println!("{}", self.tagged(Tag::Step, message));
    }

    /// Blank line, then a bold heading.
    pub fn section(&self, title: &str) {
        println!();
        println!("{}", self.paint(title, &[Style::Magenta, Style::Bold]));
    }

    /// De-emphasized text such as ids.
    pub fn muted(&self, text: &str) -> String {
        self.paint(text, &[Style::Dim])
    }

    pub fn count(&self, n: usize) -> String {
        self.paint(&n.to_string(), &[Style::Green, Style::Bold])
    }

    /// `[Batch 2/5]`
    pub fn batch_info(&self, batch: usize, total: usize) -> String {
        self.paint(&format!("[Batch {}/{}]", batch, total), &[Style::Cyan, Style::Bold])
    }

    /// Prints one aligned row of the end-of-run summary.
    pub fn summary_line(&self, label: &str, value: usize) {
        println!("  {:<24} {}", self.muted(label), self.count(value));
    }
}
