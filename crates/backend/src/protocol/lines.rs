//! Line reading for the messages stream.
//!
//! Restic echoes raw file names, which need not be UTF-8. Lines are read as
//! bytes and converted lossily so a single bad byte never ends the stream.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Read the next line into `buf`, returning it without the line ending.
///
/// Returns `None` at end of input. Cancel safe when used in `select!` as long
/// as the same `buf` is passed to the next call: partially read bytes stay in
/// `buf` and are completed by it.
pub async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>>
where
  R: AsyncBufRead + Unpin,
{
  let read = reader.read_until(b'\n', buf).await?;
  if read == 0 && buf.is_empty() {
    return Ok(None);
  }
  Ok(Some(take_line(buf)))
}

fn take_line(buf: &mut Vec<u8>) -> String {
  let mut end = buf.len();
  if buf.ends_with(b"\n") {
    end -= 1;
    if buf[..end].ends_with(b"\r") {
      end -= 1;
    }
  }

  let line = String::from_utf8_lossy(&buf[..end]).into_owned();
  buf.clear();
  line
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  async fn read_all(mut input: &[u8]) -> Vec<String> {
    let mut buf = Vec::new();
    let mut lines = Vec::new();
    while let Some(line) = read_line(&mut input, &mut buf).await.unwrap() {
      lines.push(line);
    }
    lines
  }

  #[tokio::test]
  async fn test_invalid_utf8_does_not_end_input() {
    let input = b"{\"message_type\":\"status\"}\nerror: lstat /home/u/caf\xe9\r\n{\"message_type\":\"summary\"}";

    assert_eq!(
      read_all(input).await,
      vec![
        "{\"message_type\":\"status\"}",
        "error: lstat /home/u/caf\u{fffd}",
        "{\"message_type\":\"summary\"}",
      ]
    );
  }

  #[tokio::test]
  async fn test_empty_lines_are_kept() {
    assert_eq!(read_all(b"a\n\nb\n").await, vec!["a", "", "b"]);
    assert!(read_all(b"").await.is_empty());
  }
}
