//! Log line formatting with ANSI colors and text wrapping

use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::{DateTime, Local};
use colored::*;
use std::io::{stdout, ErrorKind, Write};

const TAG_WIDTH: usize = 10;
const LEVEL_WIDTH: usize = 7;
const BRACKET_SPACE_WIDTH: usize = 3;
const TIME_WIDTH: usize = 9;

/// Maximum line length before wrapping
const MAX_LINE_LENGTH: usize = 140;

/// Console lines: colored prefix on the first line, aligned continuation lines
pub fn console_lines(now: &DateTime<Local>, tag: LogTag, level: LogLevel, message: &str) -> Vec<String> {
    let time = now.format("%H:%M:%S ").to_string().dimmed();
    let tag_str = tag.colorize(format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH));
    let level_str = format_level(level);
    let base_line = format!("{}[{}] [{}] ", time, tag_str, level_str);

    let prefix_width = TIME_WIDTH + TAG_WIDTH + LEVEL_WIDTH + BRACKET_SPACE_WIDTH * 2;
    let available = MAX_LINE_LENGTH.saturating_sub(prefix_width).max(40);
    let chunks = wrap_text(message, available);

    let continuation = " ".repeat(prefix_width);
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            if i == 0 {
                format!("{}{}", base_line, chunk)
            } else {
                format!("{}{}", continuation, chunk)
            }
        })
        .collect()
}

/// Plain file line without colors or wrapping
pub fn file_line(now: &DateTime<Local>, tag: LogTag, level: LogLevel, message: &str) -> String {
    format!(
        "{} [{}] [{}] {}",
        now.format("%Y-%m-%d %H:%M:%S"),
        tag.to_plain_string(),
        level.as_str(),
        strip_ansi_codes(message)
    )
}

fn format_level(level: LogLevel) -> ColoredString {
    let padded = format!("{:<width$}", level.as_str(), width = LEVEL_WIDTH);
    match level {
        LogLevel::Error => padded.bright_red().bold(),
        LogLevel::Warning => padded.bright_yellow().bold(),
        LogLevel::Info => padded.white().bold(),
        LogLevel::Debug => padded.bright_black(),
        LogLevel::Verbose => padded.dimmed(),
    }
}

/// Print to stdout but ignore broken pipe errors
pub fn print_stdout_safe(message: &str) {
    let mut out = stdout().lock();
    if let Err(e) = writeln!(out, "{}", message) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        let _ = writeln!(std::io::stderr(), "Logger stdout error: {}", e);
    }
    let _ = out.flush();
}

/// Remove ANSI color codes from text
pub fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_escape = false;

    for ch in text.chars() {
        if ch == '\x1b' {
            in_escape = true;
        } else if in_escape && ch == 'm' {
            in_escape = false;
        } else if !in_escape {
            result.push(ch);
        }
    }
    result
}

/// Wrap text at word boundaries, respecting existing newlines
pub fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let max_width = max_width.max(1);
    let mut result = Vec::new();

    for line in text.split('\n') {
        if strip_ansi_codes(line).chars().count() <= max_width {
            result.push(line.to_string());
            continue;
        }

        let mut current = String::new();
        let mut current_len = 0usize;
        for word in line.split_whitespace() {
            let word_len = strip_ansi_codes(word).chars().count();

            if word_len > max_width {
                if !current.is_empty() {
                    result.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let chars: Vec<char> = word.chars().collect();
                for chunk in chars.chunks(max_width) {
                    result.push(chunk.iter().collect());
                }
            } else if current.is_empty() {
                current = word.to_string();
                current_len = word_len;
            } else if current_len + word_len + 1 <= max_width {
                current.push(' ');
                current.push_str(word);
                current_len += word_len + 1;
            } else {
                result.push(std::mem::replace(&mut current, word.to_string()));
                current_len = word_len;
            }
        }

        if !current.is_empty() {
            result.push(current);
        }
    }

    if result.is_empty() {
        result.push(String::new());
    }
    result
}
