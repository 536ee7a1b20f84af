use std::fmt;
use std::path::PathBuf;

use crate::error::ShellError;

/// One word of input. `quoted` is set when any part of the word came from
/// quotes or a backslash escape, which keeps `"|"` or `\<` from being read
/// as operators.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub quoted: bool,
}

impl Token {
    fn operator(&self) -> Option<&str> {
        if self.quoted {
            return None;
        }
        match self.text.as_str() {
            op @ ("<" | ">" | "|" | "&") => Some(op),
            _ => None,
        }
    }
}

/// A parsed stage, optionally chained to one following stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Argument vector; `args[0]` is the program name.
    pub args: Vec<String>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    /// Whether the shell waits for this command before prompting again.
    pub blocking: bool,
    /// Second stage of a two-stage pipeline.
    pub next: Option<Box<Command>>,
}

impl Command {
    pub fn program(&self) -> &str {
        &self.args[0]
    }

    pub fn is_pipeline(&self) -> bool {
        self.next.is_some()
    }

    pub fn has_redirection(&self) -> bool {
        self.input.is_some() || self.output.is_some()
    }
}

/// Renders a single stage (redirections included, pipe continuation and `&`
/// left out), which is what listings and notices show.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args.join(" "))?;
        if let Some(input) = &self.input {
            write!(f, " < {}", input.display())?;
        }
        if let Some(output) = &self.output {
            write!(f, " > {}", output.display())?;
        }
        Ok(())
    }
}

/// States for the tokenizer state machine.
enum State {
    /// Between tokens — whitespace is skipped
    Normal,
    /// Building an unquoted word — whitespace ends it
    InWord,
    /// Inside double quotes — whitespace is preserved
    InDoubleQuote,
    /// Inside single quotes — everything is literal
    InSingleQuote,
}

/// Split a line into words, honouring quotes and backslash escapes.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut quoted = false;
    let mut state = State::Normal;
    let mut chars = input.chars().peekable();

    let mut finish = |text: &mut String, quoted: &mut bool| {
        tokens.push(Token {
            text: std::mem::take(text),
            quoted: std::mem::replace(quoted, false),
        });
    };

    while let Some(ch) = chars.next() {
        match (&state, ch) {
            (State::Normal, ' ' | '\t' | '\n' | '\r') => {}
            (State::Normal | State::InWord, '"') => {
                quoted = true;
                state = State::InDoubleQuote;
            }
            (State::Normal | State::InWord, '\'') => {
                quoted = true;
                state = State::InSingleQuote;
            }
            (State::Normal | State::InWord, '\\') => {
                quoted = true;
                text.push(chars.next().unwrap_or('\\'));
                state = State::InWord;
            }
            (State::Normal | State::InWord, c) if c == '&' && chars.peek().is_none() => {
                // A trailing `&` glued to the last word still means background.
                if !text.is_empty() || quoted {
                    finish(&mut text, &mut quoted);
                }
                text.push('&');
                state = State::InWord;
            }
            (State::Normal, c) => {
                text.push(c);
                state = State::InWord;
            }
            (State::InWord, ' ' | '\t' | '\n' | '\r') => {
                finish(&mut text, &mut quoted);
                state = State::Normal;
            }
            (State::InWord, c) => text.push(c),
            (State::InDoubleQuote, '"') => state = State::InWord,
            (State::InDoubleQuote, '\\') => match chars.peek() {
                Some(&('"' | '\\' | '$' | '`')) => text.extend(chars.next()),
                _ => text.push('\\'),
            },
            (State::InDoubleQuote, c) => text.push(c),
            (State::InSingleQuote, '\'') => state = State::InWord,
            (State::InSingleQuote, c) => text.push(c),
        }
    }

    // Unterminated quotes keep whatever they collected.
    if !matches!(state, State::Normal) {
        finish(&mut text, &mut quoted);
    }

    tokens
}

/// Parse one input line. `Ok(None)` means the line was blank.
pub fn parse(line: &str) -> Result<Option<Command>, ShellError> {
    let mut tokens = tokenize(line);
    if tokens.is_empty() {
        return Ok(None);
    }

    let blocking = tokens.last().and_then(Token::operator) != Some("&");
    if !blocking {
        tokens.pop();
    }
    if tokens.is_empty() {
        return Err(ShellError::Parse("unexpected token `&'".into()));
    }

    let mut stages = tokens.split(|t| t.operator() == Some("|"));
    let first = stages.next().unwrap_or_default();
    let second = stages.next();
    if stages.next().is_some() {
        return Err(ShellError::Parse("only one `|' per line is supported".into()));
    }

    let mut head = parse_stage(first)?;
    head.blocking = blocking;
    if let Some(tokens) = second {
        let mut tail = parse_stage(tokens)?;
        tail.blocking = blocking;
        head.next = Some(Box::new(tail));
    }
    Ok(Some(head))
}

fn parse_stage(tokens: &[Token]) -> Result<Command, ShellError> {
    let mut args = Vec::new();
    let mut input = None;
    let mut output = None;
    let mut iter = tokens.iter();

    while let Some(token) = iter.next() {
        match token.operator() {
            Some(op @ ("<" | ">")) => {
                let target = match iter.next() {
                    Some(t) if t.operator().is_none() => PathBuf::from(&t.text),
                    _ => {
                        return Err(ShellError::Parse(format!(
                            "expected filename after `{op}'"
                        )));
                    }
                };
                if op == "<" {
                    input = Some(target);
                } else {
                    output = Some(target);
                }
            }
            Some(op) => {
                return Err(ShellError::Parse(format!("unexpected token `{op}'")));
            }
            None => args.push(token.text.clone()),
        }
    }

    if args.is_empty() {
        return Err(ShellError::Parse("missing command".into()));
    }

    Ok(Command {
        args,
        input,
        output,
        blocking: true,
        next: None,
    })
}
