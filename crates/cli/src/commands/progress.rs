//! Render a message stream read from stdin

use anyhow::Result;
use dfb::protocol::{MessageRouter, lines::read_line};
use tokio::{
  io::{AsyncBufRead, BufReader},
  sync::mpsc,
};
use tracing::debug;

use crate::format::ProgressPrinter;

/// Read JSON lines from stdin until EOF and print progress for them
pub async fn cmd_progress(prefix: Option<String>) -> Result<()> {
  let mut printer = ProgressPrinter::stdout();
  if let Some(prefix) = prefix {
    printer = printer.with_prefix(prefix);
  }

  let (tx, rx) = mpsc::unbounded_channel();
  let router = tokio::spawn(MessageRouter::new().with(printer).run(rx));

  forward_lines(BufReader::new(tokio::io::stdin()), tx).await?;

  let stats = router.await?;
  debug!(routed = stats.routed, ignored = stats.ignored, "Progress input closed");
  Ok(())
}

/// Send every line of `reader` until EOF. Lines that are not UTF-8 are passed
/// on lossily, for the router to drop.
async fn forward_lines<R>(mut reader: R, tx: mpsc::UnboundedSender<String>) -> Result<()>
where
  R: AsyncBufRead + Unpin,
{
  let mut buf = Vec::new();
  while let Some(line) = read_line(&mut reader, &mut buf).await? {
    if tx.send(line).is_err() {
      break;
    }
  }
  Ok(())
}
