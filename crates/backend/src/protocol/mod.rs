//! JSON Lines message protocol of a backup run.
//!
//! Every line on the messages stream is one of:
//!
//! - a restic `status` message (progress of the running backup)
//! - a restic `summary` message (totals once a domain finished)
//! - a `dfb` control message emitted by the pipeline itself
//!
//! Anything else (restic's `verbose_status`, plain stderr text, malformed JSON)
//! decodes to `None` and is ignored by consumers.
//!
//! Restic lines carry no domain name. Consumers attribute them to the domain
//! opened by the most recent `begin` control message.

pub mod format;
pub mod lines;
mod router;
mod tracker;

use serde::{Deserialize, Serialize};

pub use self::{
  router::{MessageConsumer, MessageRouter, RouterStats},
  tracker::{DomainRun, DomainTracker, RunState},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum Message {
  Status(StatusMessage),
  Summary(SummaryMessage),
  #[serde(rename = "dfb")]
  Control(ControlMessage),
}

impl Message {
  /// Decode one line. Returns `None` for anything that is not a known message.
  pub fn decode(line: &str) -> Option<Self> {
    let line = line.trim();
    if !line.starts_with('{') {
      return None;
    }
    serde_json::from_str(line).ok()
  }
}

/// Progress of a running backup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusMessage {
  /// Fraction between 0 and 1
  pub percent_done: f64,
  pub seconds_elapsed: u64,
  pub seconds_remaining: u64,
  pub bytes_done: u64,
  pub total_bytes: u64,
  pub files_done: u64,
  pub total_files: u64,
  pub current_files: Vec<String>,
}

/// Totals of a finished backup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryMessage {
  pub files_new: u64,
  pub files_changed: u64,
  pub files_unmodified: u64,
  pub dirs_new: u64,
  pub dirs_changed: u64,
  pub total_files_processed: u64,
  pub total_bytes_processed: u64,
  pub data_added: u64,
  /// Seconds
  pub total_duration: f64,
  pub snapshot_id: Option<String>,
}

/// What a control message announces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
  /// A domain's backup starts; closes whatever domain was open before
  Begin,
  /// Nothing exists at the domain's working path, it was skipped
  Unavailable,
  /// The domain does not back up to this repository
  NotThisRepo,
  GatheringStats,
  GatheringStatsDone,
  /// The whole run finished
  Done,
}

impl Action {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Begin => "begin",
      Self::Unavailable => "unavailable",
      Self::NotThisRepo => "not_this_repo",
      Self::GatheringStats => "gathering_stats",
      Self::GatheringStatsDone => "gathering_stats_done",
      Self::Done => "done",
    }
  }

  /// Actions that move the current domain to the one named in the message
  pub fn switches_domain(&self) -> bool {
    matches!(self, Self::Begin | Self::Unavailable | Self::NotThisRepo)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
  #[serde(default)]
  pub group: String,
  #[serde(default)]
  pub domain: String,
  pub action: Action,
}

impl ControlMessage {
  pub fn new(group: impl Into<String>, domain: impl Into<String>, action: Action) -> Self {
    Self {
      group: group.into(),
      domain: domain.into(),
      action,
    }
  }

  /// Encode as a single protocol line
  pub fn to_line(&self) -> String {
    serde_json::json!({
      "message_type": "dfb",
      "group": self.group,
      "domain": self.domain,
      "action": self.action.as_str(),
    })
    .to_string()
  }
}
