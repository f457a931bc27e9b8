//! Line positions for JSON Pointers.
//!
//! `serde_json` forgets where a value came from once the text is parsed, so
//! schema failures only carry an abstract JSON Pointer. This module scans the
//! raw text a second time with a small tokenizer that tracks line numbers and
//! records, for every addressable location, the line on which its value starts.
//!
//! The scanner keeps an explicit stack of open containers instead of recursing,
//! so deeply nested documents cannot overflow the call stack.

use std::collections::HashMap;

use tracing::{debug, warn};

/// Mapping from normalized JSON Pointer to 1-based line number.
///
/// Built from the exact text that is being validated and thrown away after
/// the pass that built it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionMap {
    lines: HashMap<String, usize>,
}

impl PositionMap {
    /// Line where the value at `pointer` begins.
    pub fn line(&self, pointer: &str) -> Option<usize> {
        self.lines.get(pointer).copied()
    }

    /// Line for `pointer`, or 1 if the pointer is not in the document.
    ///
    /// The root pointer falls back silently; anything else is logged.
    pub fn line_or_default(&self, pointer: &str) -> usize {
        match self.line(pointer) {
            Some(line) => line,
            None => {
                if !pointer.is_empty() {
                    warn!(pointer, "unknown line number for JSON pointer");
                }
                1
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Entries ordered by line, then pointer.
    pub fn sorted(&self) -> Vec<(&str, usize)> {
        let mut entries: Vec<(&str, usize)> = self
            .lines
            .iter()
            .map(|(pointer, line)| (pointer.as_str(), *line))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}

/// Escape one reference token (RFC 6901): `~` becomes `~0`, `/` becomes `~1`.
pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Build the pointer → line map for `text`.
///
/// Scanning stops at the first byte that cannot continue a JSON document;
/// whatever was recorded up to that point is returned.
pub fn build_position_map(text: &str) -> PositionMap {
    let mut scanner = Scanner::new(text);
    if let Err(offset) = scanner.run() {
        debug!(offset, "stopped indexing at malformed JSON");
    }
    PositionMap {
        lines: scanner.lines,
    }
}

/// An open container and the pointer it lives at.
enum Frame {
    Object { pointer: String, key: String },
    Array { pointer: String, index: usize },
}

impl Frame {
    /// Pointer of the member or element currently being read.
    fn child_pointer(&self) -> String {
        match self {
            Frame::Object { pointer, key } => format!("{}/{}", pointer, escape_token(key)),
            Frame::Array { pointer, index } => format!("{}/{}", pointer, index),
        }
    }
}

/// Container opened by the value just read, if any.
enum Opened {
    Object,
    Array,
    Nothing,
}

/// What the scanner expects next.
enum State {
    Value,
    /// After `{` or `,` inside an object.
    Key { first: bool },
    /// After a complete value.
    AfterValue,
    /// After `[`: a value or `]`.
    FirstElement,
}

struct Scanner<'a> {
    bytes: &'a [u8],
    text: &'a str,
    pos: usize,
    line: usize,
    stack: Vec<Frame>,
    lines: HashMap<String, usize>,
}

/// Byte offset where scanning gave up.
type ScanResult<T> = Result<T, usize>;

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        Self {
            bytes: text.as_bytes(),
            text,
            pos: 0,
            line: 1,
            stack: Vec::new(),
            lines: HashMap::new(),
        }
    }

    fn run(&mut self) -> ScanResult<()> {
        let mut state = State::Value;
        loop {
            self.skip_whitespace();
            state = match state {
                State::Value => match self.value()? {
                    Opened::Object => State::Key { first: true },
                    Opened::Array => State::FirstElement,
                    Opened::Nothing => State::AfterValue,
                },
                State::FirstElement => {
                    if self.peek() == Some(b']') {
                        self.pos += 1;
                        self.stack.pop();
                        State::AfterValue
                    } else {
                        State::Value
                    }
                }
                State::Key { first } => match self.peek() {
                    Some(b'}') if first => {
                        self.pos += 1;
                        self.stack.pop();
                        State::AfterValue
                    }
                    Some(b'"') => {
                        let key = self.string()?;
                        self.skip_whitespace();
                        self.expect(b':')?;
                        match self.stack.last_mut() {
                            Some(Frame::Object { key: slot, .. }) => *slot = key,
                            _ => return Err(self.pos),
                        }
                        State::Value
                    }
                    _ => return Err(self.pos),
                },
                State::AfterValue => {
                    let next = self.peek();
                    let Some(frame) = self.stack.last_mut() else {
                        return Ok(());
                    };
                    match (frame, next) {
                        (Frame::Object { .. }, Some(b',')) => {
                            self.pos += 1;
                            State::Key { first: false }
                        }
                        (Frame::Array { index, .. }, Some(b',')) => {
                            *index += 1;
                            self.pos += 1;
                            State::Value
                        }
                        (Frame::Object { .. }, Some(b'}')) | (Frame::Array { .. }, Some(b']')) => {
                            self.pos += 1;
                            self.stack.pop();
                            State::AfterValue
                        }
                        _ => return Err(self.pos),
                    }
                }
            };
        }
    }

    /// Record the current location and consume one value. Containers are
    /// only opened here; their contents are handled by the state loop.
    fn value(&mut self) -> ScanResult<Opened> {
        let pointer = match self.stack.last() {
            Some(frame) => frame.child_pointer(),
            None => String::new(),
        };
        let Some(byte) = self.peek() else {
            return Err(self.pos);
        };
        // Later duplicates overwrite earlier ones, matching serde_json.
        self.lines.insert(pointer.clone(), self.line);

        match byte {
            b'{' => {
                self.pos += 1;
                self.stack.push(Frame::Object {
                    pointer,
                    key: String::new(),
                });
                Ok(Opened::Object)
            }
            b'[' => {
                self.pos += 1;
                self.stack.push(Frame::Array { pointer, index: 0 });
                Ok(Opened::Array)
            }
            b'"' => {
                self.string()?;
                Ok(Opened::Nothing)
            }
            b'-' | b'0'..=b'9' | b't' | b'f' | b'n' => {
                self.scalar()?;
                Ok(Opened::Nothing)
            }
            _ => Err(self.pos),
        }
    }

    /// Consume a string literal and return its decoded content.
    fn string(&mut self) -> ScanResult<String> {
        let start = self.pos;
        self.expect(b'"')?;
        loop {
            match self.peek() {
                None => return Err(start),
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => self.pos += 2,
                Some(b'\n') => {
                    self.line += 1;
                    self.pos += 1;
                }
                Some(_) => self.pos += 1,
            }
        }
        let raw = self.text.get(start..self.pos).ok_or(start)?;
        serde_json::from_str(raw).map_err(|_| start)
    }

    /// Numbers and the `true`/`false`/`null` literals.
    fn scalar(&mut self) -> ScanResult<()> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'+' | b'.') {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            Err(start)
        } else {
            Ok(())
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b'\n' => self.line += 1,
                b' ' | b'\t' | b'\r' => {}
                _ => break,
            }
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> ScanResult<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.pos)
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }
}
