//! Terminal logging.
//!
//! Every line is `[module] message`, cut to the terminal width unless the
//! message spans several lines (template errors, stderr of a filter).
//! `debug!` lines only show with `--verbose`. Watch mode reports each
//! rebuild through [`WatchStatus`], which redraws in place.
//!
//! ```ignore
//! log!("build"; "Rendering {} changed pages of {} total", changed, total);
//! debug!("peek"; "{} -> {}", page.source, page.path);
//! ```

use colored::{ColoredString, Colorize};
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType, size},
};
use std::{
    io::{Write, stdout},
    sync::{
        OnceLock,
        atomic::{AtomicBool, Ordering},
    },
};

static TERMINAL_WIDTH: OnceLock<usize> = OnceLock::new();
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Columns taken by `[` `]` and the space after the prefix
const PREFIX_FRAME: usize = 3;

fn terminal_width() -> usize {
    *TERMINAL_WIDTH.get_or_init(|| size().map_or(120, |(w, _)| usize::from(w)))
}

pub fn set_verbose(on: bool) {
    VERBOSE.store(on, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

// ============================================================================
// Macros
// ============================================================================

/// `log!("module"; "format {}", args)`
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// `log!` that only prints in verbose mode.
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Output
// ============================================================================

pub fn log(module: &str, message: &str) {
    let room = terminal_width().saturating_sub(module.len() + PREFIX_FRAME);
    let message = if message.contains('\n') {
        message
    } else {
        clip(message, room)
    };

    let mut stdout = stdout().lock();
    execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    writeln!(stdout, "{} {message}", prefix(module)).ok();
    stdout.flush().ok();
}

fn prefix(module: &str) -> ColoredString {
    let tag = format!("[{module}]");
    match module {
        "error" => tag.bright_red().bold(),
        "warn" => tag.bright_magenta().bold(),
        "watch" => tag.bright_green().bold(),
        "serve" | "reload" => tag.bright_blue().bold(),
        _ => tag.bright_yellow().bold(),
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
fn clip(s: &str, max: usize) -> &str {
    let end = s
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|&end| end <= max)
        .last()
        .unwrap_or(0);
    &s[..end]
}

// ============================================================================
// Watch Status
// ============================================================================

/// Rebuild report for watch mode. Each report replaces the previous one.
pub struct WatchStatus {
    /// Lines printed by the previous report
    shown: usize,
}

impl WatchStatus {
    pub const fn new() -> Self {
        Self { shown: 0 }
    }

    pub fn success(&mut self, message: &str) {
        self.show(Some("✓".green()), message);
    }

    pub fn unchanged(&mut self, message: &str) {
        self.show(None, &message.dimmed().to_string());
    }

    /// `detail` goes on the lines below `summary`.
    pub fn error(&mut self, summary: &str, detail: &str) {
        let message = if detail.is_empty() {
            summary.to_owned()
        } else {
            format!("{summary}\n{detail}")
        };
        self.show(Some("✗".red()), &message);
    }

    fn show(&mut self, mark: Option<ColoredString>, message: &str) {
        let mut stdout = stdout().lock();

        if self.shown > 0 {
            let up = u16::try_from(self.shown).unwrap_or(u16::MAX);
            execute!(stdout, cursor::MoveUp(up), Clear(ClearType::FromCursorDown)).ok();
        }

        let time = format!("[{}]", chrono::Local::now().format("%H:%M:%S")).dimmed();
        match mark {
            Some(mark) => writeln!(stdout, "{time} {mark} {message}").ok(),
            None => writeln!(stdout, "{time} {message}").ok(),
        };
        stdout.flush().ok();

        self.shown = message.lines().count().max(1);
    }
}
