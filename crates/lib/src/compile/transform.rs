//! Source transformers that split one script into its two phases.
//!
//! A classpath block is a top-level statement of the form `name { ... }`.
//! [`Transformer::ClasspathOnly`] keeps only the bodies of those blocks and
//! [`Transformer::StripClasspath`] removes them. Both keep every line where it
//! was, so compiler line numbers still point at the user's file.

use crate::error::Phase;

/// Keywords that open a block closed by `end` or `until`.
const BLOCK_OPENERS: &[&str] = &["function", "if", "do", "repeat"];
const BLOCK_CLOSERS: &[&str] = &["end", "until"];

/// Words after which a name is an expression, not a statement.
const EXPRESSION_PREFIXES: &[&str] = &["local", "return", "and", "or", "not", "in", "function"];

pub const LUA_KEYWORDS: &[&str] = &[
  "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in", "local", "nil", "not",
  "or", "repeat", "return", "then", "true", "until", "while",
];

/// A block that was opened but never closed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{name}' block opened on line {line} is never closed")]
pub struct UnterminatedBlock {
  pub name: String,
  pub line: usize,
}

/// Byte offsets of one classpath block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
  /// First byte of the block name.
  pub start: usize,
  /// The opening `{`.
  pub open: usize,
  /// The matching `}`.
  pub close: usize,
}

/// Rewrites script text for one compilation phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transformer {
  /// Keep only the statements inside the named blocks.
  ClasspathOnly(String),
  /// Keep everything except the named blocks.
  StripClasspath(String),
}

impl Transformer {
  pub fn classpath_only(closure: impl Into<String>) -> Self {
    Transformer::ClasspathOnly(closure.into())
  }

  pub fn strip_classpath(closure: impl Into<String>) -> Self {
    Transformer::StripClasspath(closure.into())
  }

  pub fn closure_name(&self) -> &str {
    match self {
      Transformer::ClasspathOnly(name) | Transformer::StripClasspath(name) => name,
    }
  }

  pub fn phase(&self) -> Phase {
    match self {
      Transformer::ClasspathOnly(_) => Phase::Classpath,
      Transformer::StripClasspath(_) => Phase::Main,
    }
  }

  pub fn transform(&self, text: &str) -> Result<String, UnterminatedBlock> {
    let blocks = find_blocks(text, self.closure_name())?;
    Ok(match self {
      Transformer::ClasspathOnly(_) => extract(text, &blocks),
      Transformer::StripClasspath(_) => strip(text, &blocks),
    })
  }
}

/// Whether `name` can be used as a block name.
pub fn is_valid_closure_name(name: &str) -> bool {
  let mut chars = name.chars();
  let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
  starts_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !LUA_KEYWORDS.contains(&name)
}

fn extract(text: &str, blocks: &[Block]) -> String {
  let mut out = String::with_capacity(text.len());
  let mut cursor = 0;
  for block in blocks {
    push_newlines(&mut out, &text[cursor..block.open]);
    out.push_str("do ");
    out.push_str(&text[block.open + 1..block.close]);
    out.push_str(" end");
    cursor = block.close + 1;
  }
  push_newlines(&mut out, &text[cursor..]);
  out
}

fn strip(text: &str, blocks: &[Block]) -> String {
  let mut out = String::with_capacity(text.len());
  let mut cursor = 0;
  for block in blocks {
    out.push_str(&text[cursor..block.start]);
    push_blanked(&mut out, &text[block.start..=block.close]);
    cursor = block.close + 1;
  }
  out.push_str(&text[cursor..]);
  out
}

fn push_newlines(out: &mut String, segment: &str) {
  out.extend(segment.chars().filter(|&c| c == '\n'));
}

fn push_blanked(out: &mut String, segment: &str) {
  out.extend(segment.chars().map(|c| if c == '\n' { '\n' } else { ' ' }));
}

fn line_of(text: &str, pos: usize) -> usize {
  text.as_bytes()[..pos].iter().filter(|&&b| b == b'\n').count() + 1
}

fn is_ident_start(b: u8) -> bool {
  b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
  b.is_ascii_alphanumeric() || b == b'_'
}

/// Level of a long bracket (`[[`, `[==[`) starting at `i`.
fn long_bracket_level(bytes: &[u8], i: usize) -> Option<usize> {
  if bytes.get(i) != Some(&b'[') {
    return None;
  }
  let mut j = i + 1;
  while bytes.get(j) == Some(&b'=') {
    j += 1;
  }
  (bytes.get(j) == Some(&b'[')).then_some(j - i - 1)
}

/// Index just past the long bracket closing `level`, searching from `from`.
fn long_bracket_end(bytes: &[u8], from: usize, level: usize) -> usize {
  let mut i = from;
  while i < bytes.len() {
    if bytes[i] == b']' {
      let mut j = i + 1;
      while j < bytes.len() && bytes[j] == b'=' {
        j += 1;
      }
      if j - i - 1 == level && bytes.get(j) == Some(&b']') {
        return j + 1;
      }
    }
    i += 1;
  }
  bytes.len()
}

/// If a comment or string literal starts at `i`, the index just past it.
fn skip_literal(bytes: &[u8], i: usize) -> Option<usize> {
  match bytes[i] {
    b'-' if bytes.get(i + 1) == Some(&b'-') => {
      if let Some(level) = long_bracket_level(bytes, i + 2) {
        return Some(long_bracket_end(bytes, i + 2 + level + 2, level));
      }
      let end = bytes[i..].iter().position(|&b| b == b'\n').map_or(bytes.len(), |p| i + p);
      Some(end)
    }
    quote @ (b'"' | b'\'') => {
      let mut j = i + 1;
      while j < bytes.len() {
        match bytes[j] {
          b'\\' => j += 2,
          b'\n' => return Some(j),
          b if b == quote => return Some(j + 1),
          _ => j += 1,
        }
      }
      Some(bytes.len())
    }
    b'[' => long_bracket_level(bytes, i).map(|level| long_bracket_end(bytes, i + level + 2, level)),
    _ => None,
  }
}

/// Index of the `}` matching the `{` at `open`.
fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
  let mut depth = 0usize;
  let mut i = open;
  while i < bytes.len() {
    if let Some(next) = skip_literal(bytes, i) {
      i = next;
      continue;
    }
    match bytes[i] {
      b'{' => depth += 1,
      b'}' => {
        depth -= 1;
        if depth == 0 {
          return Some(i);
        }
      }
      _ => {}
    }
    i += 1;
  }
  None
}

/// Locate every top-level `name { ... }` block in `text`.
pub fn find_blocks(text: &str, name: &str) -> Result<Vec<Block>, UnterminatedBlock> {
  let bytes = text.as_bytes();
  let mut blocks = Vec::new();
  let mut bracket_depth = 0usize;
  let mut block_depth = 0usize;
  let mut prev: Option<u8> = None;
  let mut prev_word: Option<&str> = None;
  let mut i = 0;

  while i < bytes.len() {
    if let Some(next) = skip_literal(bytes, i) {
      if matches!(bytes[i], b'"' | b'\'' | b'[') {
        prev = Some(b'"');
        prev_word = None;
      }
      i = next;
      continue;
    }

    let b = bytes[i];
    if b.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    if is_ident_start(b) {
      let start = i;
      while i < bytes.len() && is_ident_char(bytes[i]) {
        i += 1;
      }
      let word = &text[start..i];

      if word == name && bracket_depth == 0 && block_depth == 0 && at_statement_start(prev, prev_word) {
        let mut j = i;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
          j += 1;
        }
        if bytes.get(j) == Some(&b'{') {
          let close = matching_brace(bytes, j).ok_or_else(|| UnterminatedBlock {
            name: name.to_string(),
            line: line_of(text, start),
          })?;
          blocks.push(Block { start, open: j, close });
          i = close + 1;
          prev = Some(b'}');
          prev_word = None;
          continue;
        }
      }

      if BLOCK_OPENERS.contains(&word) {
        block_depth += 1;
      } else if BLOCK_CLOSERS.contains(&word) {
        block_depth = block_depth.saturating_sub(1);
      }
      prev = Some(bytes[i - 1]);
      prev_word = Some(word);
      continue;
    }

    match b {
      b'{' | b'(' | b'[' => bracket_depth += 1,
      b'}' | b')' | b']' => bracket_depth = bracket_depth.saturating_sub(1),
      _ => {}
    }
    prev = Some(b);
    prev_word = None;
    i += 1;
  }

  Ok(blocks)
}

fn at_statement_start(prev: Option<u8>, prev_word: Option<&str>) -> bool {
  if let Some(word) = prev_word {
    return !EXPRESSION_PREFIXES.contains(&word);
  }
  match prev {
    None => true,
    Some(b) => matches!(b, b';' | b')' | b']' | b'}' | b'"') || is_ident_char(b),
  }
}
