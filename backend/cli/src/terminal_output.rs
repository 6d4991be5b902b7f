//! Terminal output for the interactive reading: notes, the profile table and
//! consultation replies.

use std::io::Write;

use tuvi_core::{Language, UserProfile};

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false))
}

/// Strip ANSI escape codes from a string.
pub fn strip_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// Drop styling when the terminal can't show it.
pub fn styled(s: String) -> String {
    if supports_color() { s } else { strip_ansi(&s) }
}

pub fn note_info(msg: &str) {
    if supports_color() {
        println!("{CYAN}{BOLD}ℹ{RESET} {msg}");
    } else {
        println!("INFO: {msg}");
    }
}

pub fn note_warn(msg: &str) {
    if supports_color() {
        println!("{YELLOW}{BOLD}⚠{RESET} {msg}");
    } else {
        println!("WARN: {msg}");
    }
}

/// Errors go to stderr.
pub fn note_error(msg: &str) {
    if supports_color() {
        eprintln!("{RED}{BOLD}✗{RESET} {msg}");
    } else {
        eprintln!("ERROR: {msg}");
    }
}

pub fn note_success(msg: &str) {
    if supports_color() {
        println!("{GREEN}{BOLD}✓{RESET} {msg}");
    } else {
        println!("OK: {msg}");
    }
}

/// Two-column label/value table of the birth details.
pub fn profile_table(profile: &UserProfile) -> String {
    let vi = profile.language == Language::Vi;
    let pick = |v: &'static str, e: &'static str| if vi { v } else { e };
    let birth = format!(
        "{}:{} {}/{}/{} ({})",
        profile.birth_hour,
        profile.birth_minute,
        profile.birth_day,
        profile.birth_month,
        profile.birth_year,
        profile.calendar_type.label(profile.language),
    );
    let rows = [
        (pick("Họ tên", "Name"), profile.full_name.clone()),
        (pick("Giới tính", "Gender"), profile.gender.label(profile.language).to_string()),
        (pick("Ngày sinh", "Born"), birth),
        (pick("Năm xem", "View year"), profile.view_year.clone()),
    ];

    let width = rows.iter().map(|(label, _)| label.chars().count()).max().unwrap_or(0);
    let mut out = String::new();
    for (label, value) in rows {
        let pad = width - label.chars().count();
        out.push_str(&format!("  {BOLD}{label}{RESET}{}  {value}\n", " ".repeat(pad)));
    }
    out
}

/// Write a chunk and flush so the prompt shows before input is read.
pub fn stream_write(writer: &mut impl Write, chunk: &str) -> std::io::Result<()> {
    writer.write_all(chunk.as_bytes())?;
    writer.flush()
}
