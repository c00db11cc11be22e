use crate::lexer::Token;
use std::fmt;

/// AST node for one input line.
///
/// A line parses to a single node: a bare command, a command wrapped in one
/// redirect per `>`/`>>` occurrence, or a pipeline of at least two such
/// stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ast {
    /// A simple command. `argv` holds the command name at index 0 followed
    /// by its arguments, and is never empty.
    Command {
        /// The command name and its arguments (`argv[0]`, `argv[1]`, ...).
        argv: Vec<String>,
    },

    /// An I/O redirection wrapping a command (or another redirect). The
    /// inner node executes with descriptor `fd` replaced by `target`.
    Redirect {
        /// The node whose descriptor is replaced.
        inner: Box<Ast>,
        /// The redirected descriptor as written (1 when unspecified).
        fd: i32,
        /// Path of the file the descriptor is pointed at.
        target: String,
        /// Open the target for appending instead of truncating.
        append: bool,
    },

    /// A pipeline of commands connected by `|`, in execution order.
    /// Always contains at least two stages.
    Pipeline(Vec<Ast>),
}

/// Errors that can occur while building the AST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// A pipeline stage has no leading word (empty line segment, leading or
    /// trailing pipe, or a redirect with no command).
    ExpectedCommand,
    /// A `>` or `>>` was not followed by a target word.
    ExpectedTarget,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::ExpectedCommand => write!(f, "syntax error: expected a command"),
            ParseError::ExpectedTarget => write!(f, "syntax error: expected a redirect target"),
        }
    }
}

impl std::error::Error for ParseError {}

struct AstBuilder {
    tokens: Vec<Token>,
    pos: usize,
}

impl AstBuilder {
    fn from(tokens: Vec<Token>) -> Self {
        AstBuilder { tokens, pos: 0 }
    }

    fn build_ast(mut self) -> Result<Ast, ParseError> {
        self.parse_pipeline()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Parse a pipeline: stage ('|' stage)*
    fn parse_pipeline(&mut self) -> Result<Ast, ParseError> {
        let mut stages = Vec::new();

        stages.push(self.parse_stage()?);

        while let Some(Token::Pipe) = self.peek() {
            self.consume();
            stages.push(self.parse_stage()?);
        }

        if stages.len() == 1 {
            Ok(stages.remove(0))
        } else {
            Ok(Ast::Pipeline(stages))
        }
    }

    /// Parse one pipeline stage: a command with its redirects.
    ///
    /// Words and redirects may interleave; all words belong to the command's
    /// argv and the redirects wrap it left-to-right, so the leftmost redirect
    /// ends up innermost.
    fn parse_stage(&mut self) -> Result<Ast, ParseError> {
        let mut argv = Vec::new();
        let mut redirects = Vec::new();

        while let Some(token) = self.peek() {
            match token {
                Token::Pipe => break,
                Token::Word(_) => {
                    if let Some(Token::Word(w)) = self.consume() {
                        argv.push(w);
                    }
                }
                Token::Redirect { fd, append } => {
                    let (fd, append) = (*fd, *append);
                    self.consume();
                    match self.consume() {
                        Some(Token::Word(target)) => redirects.push((fd, target, append)),
                        _ => return Err(ParseError::ExpectedTarget),
                    }
                }
            }
        }

        if argv.is_empty() {
            return Err(ParseError::ExpectedCommand);
        }

        let mut node = Ast::Command { argv };
        for (fd, target, append) in redirects {
            node = Ast::Redirect {
                inner: Box::new(node),
                fd,
                target,
                append,
            };
        }
        Ok(node)
    }
}

/// Constructs the AST for one line from its token stream.
///
/// Returns the root node on success. Parsing is total over the two
/// enumerated errors; it never panics on any token sequence.
pub fn parse(tokens: Vec<Token>) -> Result<Ast, ParseError> {
    AstBuilder::from(tokens).build_ast()
}
