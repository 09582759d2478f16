//! Terminal rendering of a backup run's message stream.

use std::io::{self, Write};

use dfb::protocol::{Action, ControlMessage, Message, MessageConsumer, StatusMessage, SummaryMessage, format};

/// Prints one line per status update and a line per finished domain.
///
/// Restic lines carry no domain name, so the printer follows the domain
/// opened by the latest `begin`.
pub struct ProgressPrinter<W = io::Stdout> {
  out: W,
  prefix: Option<String>,
  current: Option<String>,
}

impl ProgressPrinter {
  pub fn stdout() -> Self {
    Self::new(io::stdout())
  }
}

impl<W: Write> ProgressPrinter<W> {
  pub fn new(out: W) -> Self {
    Self {
      out,
      prefix: None,
      current: None,
    }
  }

  /// Label status lines with `prefix` instead of the current domain
  pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
    self.prefix = Some(prefix.into());
    self
  }

  pub fn into_inner(self) -> W {
    self.out
  }

  fn label(&self) -> &str {
    self
      .prefix
      .as_deref()
      .or(self.current.as_deref())
      .unwrap_or("backup")
  }

  fn status(&mut self, status: &StatusMessage) {
    let line = format!(
      "backing up {}  {}  Elapsed: {}  ETA: {}  Files: {}/{}  Bytes: {}/{}",
      self.label(),
      format::percent(status.percent_done),
      format::duration(status.seconds_elapsed),
      format::duration(status.seconds_remaining),
      status.files_done,
      status.total_files,
      format::bytes(status.bytes_done),
      format::bytes(status.total_bytes),
    );
    let _ = writeln!(self.out, "{}", line);
  }

  fn summary(&mut self, summary: &SummaryMessage) {
    let line = format!(
      "{}  100%  done in {}, added {} ({} new, {} changed files)",
      self.label(),
      format::duration(summary.total_duration.round() as u64),
      format::bytes(summary.data_added),
      summary.files_new,
      summary.files_changed,
    );
    let _ = writeln!(self.out, "{}", line);
  }

  fn control(&mut self, control: &ControlMessage) {
    if control.action.switches_domain() {
      self.current = Some(control.domain.clone());
    }

    let line = match control.action {
      Action::Begin | Action::GatheringStatsDone => return,
      Action::Unavailable => format!("{}  unavailable, nothing to back up", control.domain),
      Action::NotThisRepo => format!("{}  skipped, not backed up to this repository", control.domain),
      Action::GatheringStats => format!("{}  gathering stats", control.domain),
      Action::Done => {
        self.current = None;
        "backup finished".to_string()
      }
    };
    let _ = writeln!(self.out, "{}", line);
  }
}

impl<W: Write + Send> MessageConsumer for ProgressPrinter<W> {
  fn consume(&mut self, message: &Message) {
    match message {
      Message::Status(status) => self.status(status),
      Message::Summary(summary) => self.summary(summary),
      Message::Control(control) => self.control(control),
    }
  }

  fn finish(&mut self) {
    let _ = self.out.flush();
  }
}
