use tokio::sync::mpsc;
use tracing::trace;

use super::Message;

/// Receives decoded messages in arrival order.
///
/// Consumers that track the current domain must treat `begin` as completing
/// whatever domain was open before it.
pub trait MessageConsumer: Send {
  fn consume(&mut self, message: &Message);

  /// Called once after the stream closed
  fn finish(&mut self) {}
}

/// Counts of a finished routing run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
  pub routed: usize,
  pub ignored: usize,
}

/// Decodes raw lines and hands each message to every registered consumer.
#[derive(Default)]
pub struct MessageRouter {
  consumers: Vec<Box<dyn MessageConsumer>>,
  stats: RouterStats,
}

impl MessageRouter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, consumer: impl MessageConsumer + 'static) {
    self.consumers.push(Box::new(consumer));
  }

  pub fn with(mut self, consumer: impl MessageConsumer + 'static) -> Self {
    self.register(consumer);
    self
  }

  /// Decode and dispatch a single line. Unknown lines are dropped.
  pub fn dispatch_line(&mut self, line: &str) -> Option<Message> {
    let Some(message) = Message::decode(line) else {
      trace!(line, "Ignoring line");
      self.stats.ignored += 1;
      return None;
    };

    for consumer in &mut self.consumers {
      consumer.consume(&message);
    }
    self.stats.routed += 1;
    Some(message)
  }

  /// Tell every consumer the stream has ended
  pub fn finish(&mut self) -> RouterStats {
    for consumer in &mut self.consumers {
      consumer.finish();
    }
    self.stats
  }

  /// Route lines until every sender is dropped
  pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<String>) -> RouterStats {
    while let Some(line) = rx.recv().await {
      self.dispatch_line(&line);
    }
    self.finish()
  }
}
