//! Lexical analysis (tokenization) for the shell's command language.

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word after quote and escape processing. The payload is never empty.
    Word(String),
    /// The pipe operator, `|`.
    Pipe,
    /// An output or input redirection, `>`, `>>` or a digit-prefixed form
    /// such as `2>`. `fd` is the redirected descriptor (1 when unspecified)
    /// and `append` is true for the `>>` spelling.
    Redirect { fd: i32, append: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Unquoted,
    SingleQuote,
    DoubleQuote,
}

struct ScanFsm {
    input: Vec<char>,
    pos: usize,
    state: ScanState,
    buffer: String,
    /// Whether the pending word so far is plain unquoted text. Only such a
    /// word may fuse with a following `>` into a digit-prefixed redirect.
    word_plain: bool,
}

impl ScanFsm {
    fn new(line: &str) -> Self {
        ScanFsm {
            input: line.chars().collect(),
            pos: 0,
            state: ScanState::Unquoted,
            buffer: String::new(),
            word_plain: true,
        }
    }

    /// Tokenize the input. Malformed input never fails: an unclosed quote
    /// simply terminates the current word at end of input.
    fn make_tokens(&mut self) -> Vec<Token> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                ScanState::Unquoted => self.handle_unquoted(ch, &mut out),
                ScanState::SingleQuote => self.handle_single_quote(ch),
                ScanState::DoubleQuote => self.handle_double_quote(ch),
            }
        }

        self.flush_word(&mut out);
        out
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn handle_unquoted(&mut self, ch: char, out: &mut Vec<Token>) {
        match ch {
            ' ' | '\t' | '\r' | '\n' => self.flush_word(out),
            '|' => {
                self.flush_word(out);
                out.push(Token::Pipe);
            }
            '>' => {
                let fd = self.take_redirect_fd(out);
                let append = self.peek_char() == Some('>');
                if append {
                    self.read_char();
                }
                out.push(Token::Redirect { fd, append });
            }
            '\\' => {
                // An unquoted backslash makes the next character literal,
                // whitespace and operators included. A trailing backslash
                // stays a backslash.
                let escaped = self.read_char().unwrap_or('\\');
                self.buffer.push(escaped);
                self.word_plain = false;
            }
            '\'' => {
                self.state = ScanState::SingleQuote;
                self.word_plain = false;
            }
            '"' => {
                self.state = ScanState::DoubleQuote;
                self.word_plain = false;
            }
            c => self.buffer.push(c),
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = ScanState::Unquoted,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '"' => self.state = ScanState::Unquoted,
            '\\' => match self.peek_char() {
                // Inside double quotes only `\"` and `\\` escape; any other
                // byte keeps the backslash in front of it.
                Some(next @ ('"' | '\\')) => {
                    self.read_char();
                    self.buffer.push(next);
                }
                _ => self.buffer.push('\\'),
            },
            c => self.buffer.push(c),
        }
    }

    /// Decide the source descriptor of a `>` just read. A pending word that
    /// is exactly one plain digit fuses into the redirect (`2>err`); any
    /// other pending word is emitted first and the descriptor defaults to 1.
    fn take_redirect_fd(&mut self, out: &mut Vec<Token>) -> i32 {
        let mut chars = self.buffer.chars();
        let fused = match (chars.next(), chars.next()) {
            (Some(d), None) if self.word_plain && d.is_ascii_digit() => {
                Some(d.to_digit(10).unwrap() as i32)
            }
            _ => None,
        };
        match fused {
            Some(fd) => {
                self.buffer.clear();
                self.word_plain = true;
                fd
            }
            None => {
                self.flush_word(out);
                1
            }
        }
    }

    /// Emit the pending word, if any. Empty quoted runs contribute nothing
    /// on their own, so an empty buffer never becomes a token.
    fn flush_word(&mut self, out: &mut Vec<Token>) {
        if !self.buffer.is_empty() {
            out.push(Token::Word(std::mem::take(&mut self.buffer)));
        }
        self.word_plain = true;
    }
}

/// The main entry point to perform lexical analysis.
///
/// Splits `line` on unquoted whitespace, recognizes `|` and the redirect
/// forms, and applies the quoting rules: single quotes are fully literal,
/// double quotes honor `\"` and `\\`, and an unquoted backslash makes the
/// next character literal. Adjacent quoted and unquoted runs concatenate
/// into a single word.
pub fn scan(line: &str) -> Vec<Token> {
    ScanFsm::new(line).make_tokens()
}
