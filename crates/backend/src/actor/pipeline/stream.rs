//! The shared `messages` stream of a pipeline run.
//!
//! Restic lines carry no domain name, so consumers rely on each domain's lines
//! following its `begin` without another domain's lines in between. Workers
//! run concurrently, so the stream is a lock: the worker holding it streams
//! live, every other worker buffers until the holder is finished.
//!
//! A buffered domain keeps only its latest status line. Restic emits a status
//! several times a second for as long as a backup runs, and only the newest is
//! worth rendering once the buffer is flushed. Every other line is kept, so a
//! waiting domain holds its error lines and summary until it gets the stream.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};

use crate::protocol::Message;

type Sender = mpsc::UnboundedSender<String>;

#[derive(Debug, Clone)]
pub struct MessageStream {
  tx: Arc<Mutex<Sender>>,
}

impl MessageStream {
  pub fn new(tx: Sender) -> Self {
    Self {
      tx: Arc::new(Mutex::new(tx)),
    }
  }

  /// Send lines as one uninterrupted block
  pub async fn send_block(&self, lines: impl IntoIterator<Item = String>) {
    let tx = self.tx.lock().await;
    for line in lines {
      let _ = tx.send(line);
    }
  }

  /// Start a domain's block with its first line
  pub fn open_domain(&self, first: String) -> DomainStream {
    let mut stream = DomainStream {
      tx: self.tx.clone(),
      guard: None,
      pending: Vec::new(),
      pending_status: false,
    };
    stream.push(first);
    stream
  }
}

/// One domain's block on the stream
pub struct DomainStream {
  tx: Arc<Mutex<Sender>>,
  guard: Option<OwnedMutexGuard<Sender>>,
  pending: Vec<String>,
  /// The last pending line is a status
  pending_status: bool,
}

impl DomainStream {
  /// Send the line now if this domain owns the stream, else buffer it
  pub fn push(&mut self, line: String) {
    if self.guard.is_none()
      && let Ok(guard) = self.tx.clone().try_lock_owned()
    {
      self.guard = Some(guard);
    }

    match self.guard {
      Some(ref tx) => {
        for pending in self.pending.drain(..) {
          let _ = tx.send(pending);
        }
        let _ = tx.send(line);
        self.pending_status = false;
      }
      None => self.buffer(line),
    }
  }

  fn buffer(&mut self, line: String) {
    let is_status = matches!(Message::decode(&line), Some(Message::Status(_)));
    if is_status && self.pending_status {
      self.pending.pop();
    }
    self.pending.push(line);
    self.pending_status = is_status;
  }

  /// Flush anything buffered, waiting for the stream if needed, and release it
  pub async fn finish(mut self) {
    let tx = match self.guard.take() {
      Some(guard) => guard,
      None => self.tx.clone().lock_owned().await,
    };
    for line in self.pending.drain(..) {
      let _ = tx.send(line);
    }
  }
}
