//! Styled terminal output utilities.

use std::io::{self, BufRead, Write};

use owo_colors::OwoColorize;

/// Print a header/title
pub fn header(text: &str) {
    println!();
    println!("{}", text.bold().cyan());
    println!("{}", "─".repeat(text.chars().count()).dimmed());
    println!();
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a success message
pub fn success(text: &str) {
    println!("{} {}", "✔".green().bold(), text.green());
}

/// Print an info message
pub fn info(text: &str) {
    println!("{} {}", "ℹ".blue().bold(), text);
}

/// Print a warning message
pub fn warn(text: &str) {
    println!("{} {}", "⚠".yellow().bold(), text.yellow());
}

/// Print an error message
pub fn error(text: &str) {
    eprintln!("{} {}", "✖".red().bold(), text.red());
}

/// Print a hint under an error
pub fn hint(text: &str) {
    eprintln!("  {} {}", "hint:".dimmed(), text);
}

/// Print a list item
pub fn list_item(text: &str) {
    println!("  {} {}", "•".dimmed(), text);
}

/// Print a newline
pub fn newline() {
    println!();
}

/// Print code block
pub fn code(code: &str) {
    println!();
    for line in code.lines() {
        println!("  {}", line.bright_white());
    }
    println!();
}

/// A single status line that resolves to success or failure.
///
/// ```rust,ignore
/// let progress = Progress::start("Applying migrations");
/// progress.succeed("Applied 2 migrations");
/// ```
pub struct Progress {
    message: String,
}

impl Progress {
    /// Print `message…` without a trailing newline.
    pub fn start(message: impl Into<String>) -> Self {
        let message = message.into();
        print!("{} {}...", "◌".cyan(), message);
        io::stdout().flush().ok();
        Self { message }
    }

    /// Replace the line with a success summary.
    pub fn succeed(self, summary: &str) {
        print!("\r\x1b[2K");
        success(summary);
    }

    /// Replace the line with a neutral summary.
    pub fn info(self, summary: &str) {
        print!("\r\x1b[2K");
        info(summary);
    }

    /// Replace the line with a failure summary.
    pub fn fail(self, summary: &str) {
        println!("\r\x1b[2K{} {}", "✖".red().bold(), self.message.dimmed());
        error(summary);
    }
}

/// Whether `answer` confirms: `y` or `yes`, any case, surrounding whitespace ignored.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Ask for confirmation on stdin
pub fn confirm(prompt: &str) -> bool {
    confirm_from(&mut io::stdin().lock(), prompt)
}

/// Ask for confirmation, reading the answer from `input`
pub fn confirm_from(input: &mut impl BufRead, prompt: &str) -> bool {
    print!("{} {} ", prompt, "[y/N]".dimmed());
    io::stdout().flush().ok();

    let mut answer = String::new();
    if input.read_line(&mut answer).is_err() {
        return false;
    }

    is_affirmative(&answer)
}
