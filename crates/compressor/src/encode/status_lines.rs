//! Line splitter for ffmpeg's stderr.
//!
//! ffmpeg redraws its status line with bare carriage returns, so splitting on
//! `\n` alone would deliver a whole encode's worth of status updates as one
//! line at exit. Both `\r` and `\n` terminate a line here; a `\r\n` pair
//! terminates only one.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

pub struct StatusLines<R> {
    reader: R,
    pending: Vec<u8>,
    /// Previous terminator was `\r`
    after_cr: bool,
}

impl<R: AsyncBufRead + Unpin> StatusLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: Vec::new(),
            after_cr: false,
        }
    }

    /// Next line with trailing whitespace removed, `None` at EOF.
    ///
    /// Blank lines are delivered as empty strings.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            let available = self.reader.fill_buf().await?;

            if available.is_empty() {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.take_pending()));
            }

            match available.iter().position(|b| *b == b'\n' || *b == b'\r') {
                Some(pos) => {
                    let terminator = available[pos];
                    self.pending.extend_from_slice(&available[..pos]);
                    self.reader.consume(pos + 1);

                    let after_cr = std::mem::replace(&mut self.after_cr, terminator == b'\r');
                    if terminator == b'\n' && after_cr && self.pending.is_empty() {
                        continue;
                    }
                    return Ok(Some(self.take_pending()));
                }
                None => {
                    let len = available.len();
                    self.pending.extend_from_slice(available);
                    self.reader.consume(len);
                }
            }
        }
    }

    fn take_pending(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.pending).trim_end().to_string();
        self.pending.clear();
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    async fn collect(input: &[u8]) -> Vec<String> {
        let mut lines = StatusLines::new(input);
        let mut out = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            out.push(line);
        }
        out
    }

    #[tokio::test]
    async fn test_splits_on_carriage_returns() {
        let input = b"Input #0, mov\nframe=   10 fps=0.0\rframe=   20 fps=20\rframe=   30 fps=20\n";
        assert_eq!(
            collect(input).await,
            vec![
                "Input #0, mov",
                "frame=   10 fps=0.0",
                "frame=   20 fps=20",
                "frame=   30 fps=20",
            ]
        );
    }

    #[tokio::test]
    async fn test_crlf_counts_once_and_blank_lines_are_kept() {
        let input = b"first  \r\n\r\n\nsecond\t\r\nlast without newline";
        assert_eq!(
            collect(input).await,
            vec!["first", "", "", "second", "last without newline"]
        );
    }

    #[tokio::test]
    async fn test_blank_diagnostic_lines_are_delivered() {
        let input = b"Stream mapping:\n\n  Stream #0:0 -> #0:0\n   \nframe=1\r";
        assert_eq!(
            collect(input).await,
            vec!["Stream mapping:", "", "  Stream #0:0 -> #0:0", "", "frame=1"]
        );
    }

    #[tokio::test]
    async fn test_crlf_split_across_refills() {
        let input: &[u8] = b"abc\r\n\r\ndef\n";
        let mut lines = StatusLines::new(BufReader::with_capacity(4, input));

        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("abc"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some(""));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("def"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_leading_whitespace_is_kept() {
        assert_eq!(collect(b"  Metadata:\n").await, vec!["  Metadata:"]);
    }

    #[tokio::test]
    async fn test_lines_spanning_buffer_refills() {
        // A 4-byte buffer forces every line to be assembled across refills
        let input: &[u8] = b"frame=  123 fps=25\rframe=  456 fps=25\n";
        let mut lines = StatusLines::new(BufReader::with_capacity(4, input));

        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("frame=  123 fps=25"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("frame=  456 fps=25"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let lines = collect(b"caf\xe9\n").await;
        assert_eq!(lines, vec!["caf\u{fffd}"]);
    }
}
