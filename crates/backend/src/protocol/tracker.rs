//! Per-domain reconstruction of a backup run from the ordered message stream.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Action, ControlMessage, Message, MessageConsumer, StatusMessage, SummaryMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
  Running,
  /// Closed by a later `begin` or `done` without a summary
  Finished,
  Completed,
  Unavailable,
  NotThisRepo,
}

/// Everything the stream said about one domain
#[derive(Debug, Clone, PartialEq)]
pub struct DomainRun {
  pub group: String,
  pub domain: String,
  pub state: RunState,
  /// Messages attributed to this domain, in arrival order
  pub messages: Vec<Message>,
  pub last_status: Option<StatusMessage>,
  pub summary: Option<SummaryMessage>,
  pub stats_gathered: bool,
}

impl DomainRun {
  fn open(control: &ControlMessage, state: RunState) -> Self {
    Self {
      group: control.group.clone(),
      domain: control.domain.clone(),
      state,
      messages: vec![Message::Control(control.clone())],
      last_status: None,
      summary: None,
      stats_gathered: false,
    }
  }

  /// Number of terminal events (summary or unavailable) attributed to the run
  pub fn terminal_events(&self) -> usize {
    self
      .messages
      .iter()
      .filter(|m| match m {
        Message::Summary(_) => true,
        Message::Control(c) => c.action == Action::Unavailable,
        Message::Status(_) => false,
      })
      .count()
  }
}

#[derive(Debug, Default)]
struct TrackerState {
  runs: Vec<DomainRun>,
  current: Option<usize>,
  orphans: Vec<Message>,
  done: bool,
}

impl TrackerState {
  fn close_current(&mut self) {
    if let Some(run) = self.current.take().map(|i| &mut self.runs[i])
      && run.state == RunState::Running
    {
      run.state = RunState::Finished;
    }
  }

  fn switch_to(&mut self, run: DomainRun) {
    self.close_current();
    self.runs.push(run);
    self.current = Some(self.runs.len() - 1);
  }

  fn latest_run_of(&mut self, domain: &str) -> Option<&mut DomainRun> {
    self.runs.iter_mut().rev().find(|run| run.domain == domain)
  }

  fn consume(&mut self, message: &Message) {
    match message {
      Message::Control(control) if control.action.switches_domain() => {
        let state = match control.action {
          Action::Begin => RunState::Running,
          Action::Unavailable => RunState::Unavailable,
          _ => RunState::NotThisRepo,
        };
        self.switch_to(DomainRun::open(control, state));
      }
      Message::Control(control) => match control.action {
        Action::Done => {
          self.close_current();
          self.done = true;
        }
        // Stats messages name their domain, which need not be the current one
        _ => match self.latest_run_of(&control.domain) {
          Some(run) => {
            if control.action == Action::GatheringStatsDone {
              run.stats_gathered = true;
            }
            run.messages.push(message.clone());
          }
          None => self.orphans.push(message.clone()),
        },
      },
      Message::Status(status) => match self.current.map(|i| &mut self.runs[i]) {
        Some(run) => {
          run.last_status = Some(status.clone());
          run.messages.push(message.clone());
        }
        None => self.orphans.push(message.clone()),
      },
      Message::Summary(summary) => match self.current.map(|i| &mut self.runs[i]) {
        Some(run) => {
          run.summary = Some(summary.clone());
          run.state = RunState::Completed;
          run.messages.push(message.clone());
        }
        None => self.orphans.push(message.clone()),
      },
    }
  }
}

/// Message consumer that groups the stream by domain.
///
/// Restic lines are attributed to the domain opened by the latest `begin`,
/// `unavailable` or `not_this_repo`. Clones share state, so a clone can be
/// registered with a [`super::MessageRouter`] and read afterwards.
#[derive(Debug, Clone, Default)]
pub struct DomainTracker {
  state: Arc<Mutex<TrackerState>>,
}

impl DomainTracker {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, TrackerState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// All runs seen so far, in the order they were opened
  pub fn runs(&self) -> Vec<DomainRun> {
    self.lock().runs.clone()
  }

  /// The run currently receiving restic lines
  pub fn current(&self) -> Option<DomainRun> {
    let state = self.lock();
    state.current.map(|i| state.runs[i].clone())
  }

  /// Messages that arrived while no domain was open
  pub fn orphans(&self) -> Vec<Message> {
    self.lock().orphans.clone()
  }

  /// True once the `done` control message arrived
  pub fn is_done(&self) -> bool {
    self.lock().done
  }
}

impl MessageConsumer for DomainTracker {
  fn consume(&mut self, message: &Message) {
    self.lock().consume(message);
  }

  fn finish(&mut self) {
    self.lock().close_current();
  }
}
