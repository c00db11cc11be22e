//! The interactive line editor.
//!
//! Reads one byte at a time from a raw-mode terminal and maintains an
//! editable buffer with a cursor, tab completion and history navigation.
//! The state machine itself is generic over its streams so tests can drive
//! it with in-memory buffers; [`read_line_interactive`] wires it to the
//! real tty and holds the raw-mode guard for the duration of the call.

use crate::complete::{self, CompletionConfig};
use crate::tty::RawMode;
use std::fmt;
use std::io::{self, IsTerminal, Read, Write};
use std::os::unix::io::AsRawFd;

const BELL: &[u8] = b"\x07";
const CLEAR_TO_EOL: &[u8] = b"\x1b[K";
const CLEAR_SCREEN_AND_HOME: &[u8] = b"\x1b[2J\x1b[H";

/// Why a `read_line` call came back without a line.
#[derive(Debug)]
pub enum ReadError {
    /// `^C`: the user discarded the line being edited.
    Interrupted,
    /// `^D` or end of the input stream: the session is over.
    Eof,
    /// The terminal itself failed.
    Io(io::Error),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::Interrupted => write!(f, "interrupted"),
            ReadError::Eof => write!(f, "end of input"),
            ReadError::Io(e) => write!(f, "terminal error: {}", e),
        }
    }
}

impl std::error::Error for ReadError {}

impl From<io::Error> for ReadError {
    fn from(e: io::Error) -> Self {
        ReadError::Io(e)
    }
}

/// State for one prompt/input cycle.
pub struct Prompt<'a> {
    prompt: &'a str,
    history: &'a [String],
    completion: CompletionConfig,
    buffer: Vec<u8>,
    /// Cursor column as an index into `buffer`.
    column: usize,
    /// Set when the previous key was a tab, so the next tab lists candidates.
    double_tab: bool,
    /// Index into `history`; equal to `history.len()` while editing a fresh line.
    history_cursor: usize,
    /// The fresh line stashed away while the user walks through history.
    saved_line: Option<Vec<u8>>,
}

impl<'a> Prompt<'a> {
    pub fn new(
        prompt: &'a str,
        history: &'a [String],
        completion: CompletionConfig,
    ) -> Prompt<'a> {
        Prompt {
            prompt,
            history,
            completion,
            buffer: Vec::new(),
            column: 0,
            double_tab: false,
            history_cursor: history.len(),
            saved_line: None,
        }
    }

    /// Run the editing session until the line is accepted or abandoned.
    ///
    /// The caller is responsible for having the terminal in raw mode; see
    /// [`read_line_interactive`].
    pub fn read_line<R, W>(mut self, input: &mut R, output: &mut W) -> Result<String, ReadError>
    where
        R: Read,
        W: Write,
    {
        output.write_all(self.prompt.as_bytes())?;
        output.flush()?;

        loop {
            let byte = read_byte(input)?;
            if byte != b'\t' {
                self.double_tab = false;
            }
            match byte {
                // LF accepts the line. The tty maps Enter's CR to LF for us
                // (ICRNL stays set in raw mode).
                0x0a => {
                    output.write_all(b"\r\n")?;
                    output.flush()?;
                    return Ok(String::from_utf8_lossy(&self.buffer).into_owned());
                }
                b'\t' => self.on_tab(output)?,
                // ^C abandons the line.
                0x03 => {
                    output.write_all(b"\r\n")?;
                    output.flush()?;
                    return Err(ReadError::Interrupted);
                }
                // ^D ends the session.
                0x04 => {
                    output.write_all(b"\r\n")?;
                    output.flush()?;
                    return Err(ReadError::Eof);
                }
                // ^L clears the screen and repaints the line.
                0x0c => {
                    output.write_all(CLEAR_SCREEN_AND_HOME)?;
                    self.redraw(output)?;
                }
                0x1b => self.on_escape(input, output)?,
                // DEL rubs out the byte left of the cursor.
                0x7f => {
                    if self.column > 0 {
                        self.buffer.remove(self.column - 1);
                        self.column -= 1;
                        self.redraw(output)?;
                    }
                }
                // Remaining control bytes are ignored.
                0x00..=0x1f => {}
                b => {
                    self.buffer.insert(self.column, b);
                    self.column += 1;
                    self.redraw(output)?;
                }
            }
        }
    }

    /// Repaint the line: carriage return, clear to end of line, prompt and
    /// buffer, then park the physical cursor on the logical column.
    fn redraw<W: Write>(&self, output: &mut W) -> io::Result<()> {
        output.write_all(b"\r")?;
        output.write_all(CLEAR_TO_EOL)?;
        output.write_all(self.prompt.as_bytes())?;
        output.write_all(&self.buffer)?;
        output.write_all(b"\r")?;
        let target = self.prompt.len() + self.column;
        if target > 0 {
            write!(output, "\x1b[{}C", target)?;
        }
        output.flush()
    }

    fn on_tab<W: Write>(&mut self, output: &mut W) -> Result<(), ReadError> {
        let word = String::from_utf8_lossy(&self.buffer).into_owned();
        let candidates = complete::complete(&word, &self.completion);

        if candidates.is_empty() {
            output.write_all(BELL)?;
            output.flush()?;
            return Ok(());
        }

        if candidates.len() == 1 {
            self.buffer = candidates[0].as_bytes().to_vec();
            self.buffer.push(b' ');
            self.column = self.buffer.len();
            self.redraw(output)?;
            return Ok(());
        }

        if self.double_tab {
            // Second tab in a row: list every candidate on a fresh line.
            output.write_all(b"\r\n")?;
            output.write_all(candidates.join("  ").as_bytes())?;
            output.write_all(b"\r\n")?;
            self.redraw(output)?;
            self.double_tab = true;
            return Ok(());
        }

        let lcp = complete::longest_common_prefix(&candidates);
        if lcp.len() > self.buffer.len() {
            self.buffer = lcp.into_bytes();
            self.column = self.buffer.len();
            self.redraw(output)?;
        }
        self.double_tab = true;
        Ok(())
    }

    fn on_escape<R, W>(&mut self, input: &mut R, output: &mut W) -> Result<(), ReadError>
    where
        R: Read,
        W: Write,
    {
        if read_byte(input)? != b'[' {
            return Ok(());
        }
        match read_byte(input)? {
            b'A' => self.history_previous(output)?,
            b'B' => self.history_next(output)?,
            b'C' => {
                if self.column < self.buffer.len() {
                    self.column += 1;
                    self.redraw(output)?;
                }
            }
            b'D' => {
                if self.column > 0 {
                    self.column -= 1;
                    self.redraw(output)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn history_previous<W: Write>(&mut self, output: &mut W) -> io::Result<()> {
        if self.history_cursor == 0 {
            return Ok(());
        }
        if self.history_cursor == self.history.len() {
            self.saved_line = Some(std::mem::take(&mut self.buffer));
        }
        self.history_cursor -= 1;
        self.buffer = self.history[self.history_cursor].as_bytes().to_vec();
        self.column = self.buffer.len();
        self.redraw(output)
    }

    fn history_next<W: Write>(&mut self, output: &mut W) -> io::Result<()> {
        if self.history_cursor == self.history.len() {
            return Ok(());
        }
        self.history_cursor += 1;
        self.buffer = if self.history_cursor == self.history.len() {
            self.saved_line.take().unwrap_or_default()
        } else {
            self.history[self.history_cursor].as_bytes().to_vec()
        };
        self.column = self.buffer.len();
        self.redraw(output)
    }
}

fn read_byte<R: Read>(input: &mut R) -> Result<u8, ReadError> {
    let mut byte = [0u8; 1];
    match input.read_exact(&mut byte) {
        Ok(()) => Ok(byte[0]),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(ReadError::Eof),
        Err(e) => Err(e.into()),
    }
}

/// Read one line from the real terminal.
///
/// Raw mode is entered on begin and left on every exit path; the guard's
/// drop runs whether the line is accepted, abandoned or the read fails.
pub fn read_line_interactive(
    prompt: &str,
    history: &[String],
    completion: CompletionConfig,
) -> Result<String, ReadError> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let _raw = RawMode::enter(stdin.as_raw_fd())?;
    let mut input = stdin.lock();
    let mut output = stdout.lock();
    Prompt::new(prompt, history, completion).read_line(&mut input, &mut output)
}

/// Whether the interactive editor can run at all.
pub fn stdin_is_terminal() -> bool {
    io::stdin().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const KEYWORDS: &[&str] = &["cd", "echo", "exit", "pwd", "type"];

    fn keywords_only() -> CompletionConfig {
        CompletionConfig {
            keywords: KEYWORDS,
            path: None,
            include_cwd: false,
        }
    }

    fn run(bytes: &[u8], history: &[String]) -> (Result<String, ReadError>, String) {
        let mut input = Cursor::new(bytes.to_vec());
        let mut output = Vec::new();
        let result =
            Prompt::new("$ ", history, keywords_only()).read_line(&mut input, &mut output);
        (result, String::from_utf8_lossy(&output).into_owned())
    }

    #[test]
    fn plain_typing_accepts_on_newline() {
        let (result, _) = run(b"echo hi\n", &[]);
        assert_eq!(result.unwrap(), "echo hi");
    }

    #[test]
    fn backspace_removes_the_previous_byte() {
        let (result, _) = run(b"helloo\x7f\n", &[]);
        assert_eq!(result.unwrap(), "hello");
    }

    #[test]
    fn backspace_on_an_empty_line_is_ignored() {
        let (result, _) = run(b"\x7fok\n", &[]);
        assert_eq!(result.unwrap(), "ok");
    }

    #[test]
    fn left_arrow_then_insert_edits_mid_line() {
        // "ac", left, "b" -> "abc"
        let (result, _) = run(b"ac\x1b[Db\n", &[]);
        assert_eq!(result.unwrap(), "abc");
    }

    #[test]
    fn right_arrow_moves_back_toward_the_end() {
        // "ab", left, left, right, "x" -> "axb"
        let (result, _) = run(b"ab\x1b[D\x1b[D\x1b[Cx\n", &[]);
        assert_eq!(result.unwrap(), "axb");
    }

    #[test]
    fn unknown_escape_finals_are_ignored() {
        let (result, _) = run(b"ok\x1b[Z\n", &[]);
        assert_eq!(result.unwrap(), "ok");
    }

    #[test]
    fn control_bytes_are_ignored() {
        let (result, _) = run(b"a\x01\x02b\n", &[]);
        assert_eq!(result.unwrap(), "ab");
    }

    #[test]
    fn ctrl_c_interrupts() {
        let (result, output) = run(b"partial\x03", &[]);
        assert!(matches!(result, Err(ReadError::Interrupted)));
        assert!(output.ends_with("\r\n"));
    }

    #[test]
    fn ctrl_d_ends_the_session() {
        let (result, _) = run(b"\x04", &[]);
        assert!(matches!(result, Err(ReadError::Eof)));
    }

    #[test]
    fn stream_end_reads_as_eof() {
        let (result, _) = run(b"unfinished", &[]);
        assert!(matches!(result, Err(ReadError::Eof)));
    }

    #[test]
    fn ctrl_l_clears_the_screen() {
        let (result, output) = run(b"ls\x0c\n", &[]);
        assert_eq!(result.unwrap(), "ls");
        assert!(output.contains("\x1b[2J\x1b[H"));
    }

    #[test]
    fn single_candidate_completes_with_a_trailing_space() {
        let (result, _) = run(b"ech\t\n", &[]);
        assert_eq!(result.unwrap(), "echo ");
    }

    #[test]
    fn completion_then_typing_continues_the_line() {
        // "p" -> "pwd" is unique, completes with a space, then "x".
        let (result, _) = run(b"p\tx\n", &[]);
        assert_eq!(result.unwrap(), "pwd x");
    }

    #[test]
    fn multiple_candidates_extend_to_the_common_prefix() {
        const STEMS: &[&str] = &["echo", "echelon"];
        let config = CompletionConfig {
            keywords: STEMS,
            path: None,
            include_cwd: false,
        };
        let mut input = Cursor::new(b"ec\t\n".to_vec());
        let mut output = Vec::new();
        let result = Prompt::new("$ ", &[], config)
            .read_line(&mut input, &mut output)
            .unwrap();
        assert_eq!(result, "ech");
    }

    #[test]
    fn tab_after_extending_lists_candidates() {
        const STEMS: &[&str] = &["echo", "echelon"];
        let config = CompletionConfig {
            keywords: STEMS,
            path: None,
            include_cwd: false,
        };
        let mut input = Cursor::new(b"ec\t\t\n".to_vec());
        let mut output = Vec::new();
        let result = Prompt::new("$ ", &[], config)
            .read_line(&mut input, &mut output)
            .unwrap();
        assert_eq!(result, "ech");
        let rendered = String::from_utf8_lossy(&output);
        assert!(rendered.contains("echelon  echo"));
    }

    #[test]
    fn no_candidates_ring_the_bell() {
        let (result, output) = run(b"zz\t\n", &[]);
        assert_eq!(result.unwrap(), "zz");
        assert!(output.contains('\x07'));
    }

    #[test]
    fn double_tab_lists_all_candidates_sorted() {
        let (result, output) = run(b"\t\t\n", &[]);
        assert_eq!(result.unwrap(), "");
        assert!(output.contains("cd  echo  exit  pwd  type"));
    }

    #[test]
    fn first_tab_with_several_candidates_stays_quiet() {
        let (result, output) = run(b"e\t\n", &[]);
        assert_eq!(result.unwrap(), "e");
        assert!(!output.contains("echo  exit"));
    }

    #[test]
    fn a_key_between_tabs_resets_the_double_tab() {
        // tab, type, backspace, tab: still no listing.
        let (result, output) = run(b"e\tx\x7f\t\n", &[]);
        assert_eq!(result.unwrap(), "e");
        assert!(!output.contains("echo  exit"));
    }

    #[test]
    fn up_recalls_the_previous_entry() {
        let history = vec!["first".to_string(), "second".to_string()];
        let (result, _) = run(b"\x1b[A\n", &history);
        assert_eq!(result.unwrap(), "second");
    }

    #[test]
    fn up_up_walks_backwards() {
        let history = vec!["first".to_string(), "second".to_string()];
        let (result, _) = run(b"\x1b[A\x1b[A\n", &history);
        assert_eq!(result.unwrap(), "first");
    }

    #[test]
    fn up_at_the_oldest_entry_stays_put() {
        let history = vec!["only".to_string()];
        let (result, _) = run(b"\x1b[A\x1b[A\x1b[A\n", &history);
        assert_eq!(result.unwrap(), "only");
    }

    #[test]
    fn down_past_the_newest_restores_the_fresh_line() {
        let history = vec!["prior".to_string()];
        let (result, _) = run(b"foo\x1b[A\x1b[B\n", &history);
        assert_eq!(result.unwrap(), "foo");
    }

    #[test]
    fn down_on_a_fresh_line_does_nothing() {
        let (result, _) = run(b"keep\x1b[B\n", &[]);
        assert_eq!(result.unwrap(), "keep");
    }

    #[test]
    fn history_entries_are_not_mutated_by_editing() {
        let history = vec!["original".to_string()];
        let (result, _) = run(b"\x1b[A\x7f\x7f\n", &history);
        assert_eq!(result.unwrap(), "origin");
        assert_eq!(history[0], "original");
    }
}
