//! Fixed-size, overlapping line-window chunking.
//!
//! A file is treated as a sequence of 1-based lines. Windows of `window` lines
//! start at line 1 and advance by `window - overlap`, so consecutive chunks
//! share `overlap` lines of context and every line lands in at least one
//! window. Windows whose text is blank after trimming are dropped.

use codeseek_core::CodeseekError;

/// Default number of lines per chunk.
pub const DEFAULT_WINDOW: usize = 50;

/// Default number of lines shared by consecutive chunks.
pub const DEFAULT_OVERLAP: usize = 5;

/// A line range cut from a file, before it is embedded.
///
/// # Examples
///
/// ```
/// use codeseek_index::chunker::ChunkSpan;
///
/// let span = ChunkSpan {
///     start_line: 1,
///     end_line: 3,
///     text: "fn main() {\n    run();\n}".into(),
/// };
/// assert_eq!(span.line_count(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    /// First line of the window (1-indexed).
    pub start_line: u32,
    /// Last line of the window (inclusive).
    pub end_line: u32,
    /// The window's lines joined with `\n`.
    pub text: String,
}

impl ChunkSpan {
    /// Number of lines covered by this span.
    pub fn line_count(&self) -> u32 {
        self.end_line - self.start_line + 1
    }
}

/// Splits file content into overlapping line windows.
///
/// # Examples
///
/// ```
/// use codeseek_index::chunker::Chunker;
///
/// let chunker = Chunker::default();
/// let spans = chunker.split("fn a() {}\nfn b() {}\n");
/// assert_eq!(spans.len(), 1);
/// assert_eq!((spans[0].start_line, spans[0].end_line), (1, 2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    window: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl Chunker {
    /// Create a chunker with a custom window and overlap.
    ///
    /// # Errors
    ///
    /// Returns [`CodeseekError::Config`] if `window` is zero or `overlap` is
    /// not smaller than `window` (the windows would never advance).
    ///
    /// # Examples
    ///
    /// ```
    /// use codeseek_index::chunker::Chunker;
    ///
    /// assert!(Chunker::new(20, 4).is_ok());
    /// assert!(Chunker::new(10, 10).is_err());
    /// ```
    pub fn new(window: usize, overlap: usize) -> Result<Self, CodeseekError> {
        if window == 0 {
            return Err(CodeseekError::Config("chunk window must be at least 1 line".into()));
        }
        if overlap >= window {
            return Err(CodeseekError::Config(format!(
                "chunk overlap ({overlap}) must be smaller than the window ({window})"
            )));
        }
        Ok(Self { window, overlap })
    }

    /// Lines per window.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Lines shared between consecutive windows.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `content` into ordered, non-blank line windows.
    ///
    /// An empty file yields no spans. A file of at most `window` lines yields
    /// exactly one span covering it, unless every line is blank.
    pub fn split(&self, content: &str) -> Vec<ChunkSpan> {
        let lines: Vec<&str> = content.lines().collect();
        let total = lines.len();
        let step = self.window - self.overlap;
        let mut spans = Vec::new();

        let mut start = 0;
        while start < total {
            let end = (start + self.window).min(total);
            let text = lines[start..end].join("\n");

            if !text.trim().is_empty() {
                spans.push(ChunkSpan {
                    start_line: to_line(start + 1),
                    end_line: to_line(end),
                    text,
                });
            }

            if end >= total {
                break;
            }
            start += step;
        }

        spans
    }
}

fn to_line(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_lines(n: usize) -> String {
        (1..=n)
            .map(|i| format!("let line_{i} = {i};"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn ranges(spans: &[ChunkSpan]) -> Vec<(u32, u32)> {
        spans.iter().map(|s| (s.start_line, s.end_line)).collect()
    }

    #[test]
    fn empty_content_yields_nothing() {
        assert!(Chunker::default().split("").is_empty());
    }

    #[test]
    fn whitespace_only_content_yields_nothing() {
        assert!(Chunker::default().split("\n   \n\t\n").is_empty());
    }

    #[test]
    fn short_file_is_a_single_chunk() {
        let content = numbered_lines(10);
        let spans = Chunker::default().split(&content);
        assert_eq!(ranges(&spans), vec![(1, 10)]);
        assert_eq!(spans[0].text, content);
    }

    #[test]
    fn trailing_newline_does_not_add_a_line() {
        let content = format!("{}\n", numbered_lines(10));
        let spans = Chunker::default().split(&content);
        assert_eq!(ranges(&spans), vec![(1, 10)]);
    }

    #[test]
    fn exactly_one_window_of_lines() {
        let spans = Chunker::default().split(&numbered_lines(50));
        assert_eq!(ranges(&spans), vec![(1, 50)]);
    }

    #[test]
    fn long_file_steps_by_window_minus_overlap() {
        let spans = Chunker::default().split(&numbered_lines(120));
        assert_eq!(ranges(&spans), vec![(1, 50), (46, 95), (91, 120)]);
    }

    #[test]
    fn consecutive_chunks_share_overlap_lines() {
        let spans = Chunker::default().split(&numbered_lines(200));
        for pair in spans.windows(2) {
            assert_eq!(pair[0].end_line - pair[1].start_line + 1, 5);
        }
    }

    #[test]
    fn chunks_cover_every_line() {
        let chunker = Chunker::default();
        for total in 1..=260usize {
            let spans = chunker.split(&numbered_lines(total));
            let mut covered = vec![false; total + 1];
            for span in &spans {
                assert!(span.start_line <= span.end_line);
                for line in span.start_line..=span.end_line {
                    covered[line as usize] = true;
                }
            }
            assert!(
                covered[1..].iter().all(|c| *c),
                "lines left uncovered for a {total}-line file"
            );
            assert_eq!(spans.last().map(|s| s.end_line), Some(total as u32));
        }
    }

    #[test]
    fn blank_trailing_window_is_dropped() {
        let mut content = numbered_lines(45);
        content.push_str(&"\n".repeat(60));
        content.push_str("   ");
        let spans = Chunker::default().split(&content);
        assert_eq!(ranges(&spans)[0], (1, 50));
        assert!(spans.iter().all(|s| !s.text.trim().is_empty()));
        assert!(spans.iter().all(|s| s.start_line <= 45));
    }

    #[test]
    fn crlf_line_endings_are_handled() {
        let spans = Chunker::default().split("fn a() {}\r\nfn b() {}\r\n");
        assert_eq!(ranges(&spans), vec![(1, 2)]);
        assert_eq!(spans[0].text, "fn a() {}\nfn b() {}");
    }

    #[test]
    fn split_is_deterministic() {
        let content = numbered_lines(333);
        let chunker = Chunker::default();
        assert_eq!(chunker.split(&content), chunker.split(&content));
    }

    #[test]
    fn custom_window_and_overlap() {
        let chunker = Chunker::new(4, 1).unwrap();
        let spans = chunker.split(&numbered_lines(10));
        assert_eq!(ranges(&spans), vec![(1, 4), (4, 7), (7, 10)]);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(matches!(Chunker::new(0, 0), Err(CodeseekError::Config(_))));
        assert!(matches!(Chunker::new(5, 7), Err(CodeseekError::Config(_))));
    }
}
