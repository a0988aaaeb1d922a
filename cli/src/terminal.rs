//! Line-oriented rendering of the application state.

use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::time::Duration;

use chrono::{DateTime, Utc};
use medtrack_core::{AppState, Medicine, Notice, NoticeLevel, Page, View};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Reads one secret after showing `label`, without echoing it.
pub type SecretReader = fn(&str) -> io::Result<String>;

/// Hidden input from the controlling terminal.
pub fn read_hidden(label: &str) -> io::Result<String> {
    rpassword::prompt_password(label)
}

/// A `View` that writes to `output` and reads answers from `input`.
///
/// The command loop reads from the same input, so prompts and confirmations
/// interleave the way a user typed them.
pub struct TerminalView<R, W> {
    input: R,
    output: W,
    secret_reader: Option<SecretReader>,
}

impl<R: BufRead, W: Write> TerminalView<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            secret_reader: None,
        }
    }

    /// Read passwords through `reader` instead of the plain input.
    pub fn with_secret_reader(mut self, reader: SecretReader) -> Self {
        self.secret_reader = Some(reader);
        self
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    /// Print `label` and read one line. `None` on end of input.
    pub fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.output, "{label}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    /// Like [`prompt`](Self::prompt), but hidden when a secret reader is set.
    pub fn prompt_secret(&mut self, label: &str) -> io::Result<Option<String>> {
        let Some(read) = self.secret_reader else {
            return self.prompt(label);
        };
        match read(label) {
            Ok(secret) => Ok(Some(secret)),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Print a line, logging rather than failing when the terminal is gone.
    pub fn line(&mut self, text: impl Display) {
        if let Err(err) = writeln!(self.output, "{text}") {
            tracing::warn!(error = %err, "terminal write failed");
        }
    }

    fn heading(&mut self, page: Page, state: Option<&AppState>) {
        match page {
            Page::Home => {
                self.line("== Medicine Tracker ==");
                if state.is_some_and(AppState::is_authenticated) {
                    self.line("Type `dashboard` to see your medicines.");
                } else {
                    self.line("Type `login` or `signup` to get started.");
                }
            }
            Page::Login => self.line("-- Log in --"),
            Page::Signup => self.line("-- Sign up --"),
            Page::Dashboard => match state.and_then(AppState::session) {
                Some(user) => self.line(format_args!("-- Dashboard ({}) --", user.username)),
                None => self.line("-- Dashboard --"),
            },
            Page::MedicineForm => {
                if state.is_some_and(|s| s.pending_edit().is_some()) {
                    self.line("-- Edit Medicine --");
                } else {
                    self.line("-- Add New Medicine --");
                }
            }
        }
    }
}

fn date(ts: &DateTime<Utc>) -> String {
    ts.format(DATE_FORMAT).to_string()
}

/// One list row: id, fields, and the added/updated dates.
pub fn medicine_row(medicine: &Medicine) -> String {
    let mut row = format!(
        "[{}] {} | dosage: {} | frequency: {} | added {}",
        medicine.id,
        medicine.name,
        medicine.dosage,
        medicine.frequency,
        date(&medicine.created_at)
    );
    if medicine.was_updated() {
        row.push_str(&format!(", updated {}", date(&medicine.updated_at)));
    }
    row
}

impl<R: BufRead, W: Write> View for TerminalView<R, W> {
    fn show_page(&mut self, page: Page, state: &AppState) {
        self.heading(page, Some(state));
    }

    fn show_page_after(&mut self, page: Page, delay: Duration) {
        std::thread::sleep(delay);
        self.heading(page, None);
    }

    fn render(&mut self, state: &AppState) {
        if state.page() != Page::Dashboard {
            return;
        }
        if state.medicines().is_empty() {
            self.line("No medicines yet. Type `add` to create one.");
            return;
        }
        let rows: Vec<String> = state.medicines().iter().map(medicine_row).collect();
        for row in rows {
            self.line(row);
        }
    }

    fn notify(&mut self, notice: Notice) {
        let tag = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Error => "error",
        };
        self.line(format_args!("[{tag}] {}", notice.message));
    }

    fn set_busy(&mut self, busy: bool) {
        if busy {
            self.line("...");
        }
    }

    fn confirm(&mut self, prompt: &str) -> bool {
        match self.prompt(&format!("{prompt} [y/N] ")) {
            Ok(Some(answer)) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(error = %err, "could not read confirmation");
                false
            }
        }
    }
}
