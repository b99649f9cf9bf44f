//! Line-oriented, format-preserving edits of a YAML document.
//!
//! # Responsibilities
//! - Locate top-level keys, sequence items and mapping children by indentation
//! - Rewrite single values in place, keeping quoting style and trailing comments
//! - Insert or remove whole blocks without touching neighbouring lines
//!
//! # Design Decisions
//! - Only block-style structure is navigated; flow collections are treated as
//!   opaque inline values (except appending to a single-line flow sequence)
//! - Anything the editor cannot change safely is an `EditError`, never a
//!   silent rewrite of the whole document

use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// Errors raised by the line editor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("cannot edit `{key}`: {reason}")]
    UnsupportedLayout { key: String, reason: &'static str },

    #[error("cannot render value for `{key}`: {reason}")]
    Render { key: String, reason: String },
}

/// Quoting style of a scalar as found in the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Plain,
    Single,
    Double,
}

/// Outcome of [`YamlText::rewrite_item_field`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldRewrite {
    /// Block-style items declaring the field.
    pub visited: usize,
    pub changed: usize,
}

/// The source text of a YAML document, split into lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YamlText {
    lines: Vec<String>,
    trailing_newline: bool,
}

impl YamlText {
    pub fn parse(source: &str) -> Self {
        Self {
            lines: source.lines().map(str::to_string).collect(),
            trailing_newline: source.is_empty() || source.ends_with('\n'),
        }
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        if self.trailing_newline && !self.lines.is_empty() {
            out.push('\n');
        }
        out
    }

    /// Sets a top-level key to a scalar string, inserting it at the end of
    /// the document when absent. Returns whether the text changed.
    pub fn set_top_level_scalar(&mut self, key: &str, value: &str) -> bool {
        let quote = self
            .top_level(key)
            .and_then(|line| self.inline_value(line, 0))
            .map(|(raw, _)| quote_of(raw))
            .unwrap_or(Quote::Plain);
        let rendered = render_scalar(value, quote);
        self.set_top_level_inline(key, &rendered)
    }

    /// Sets a top-level key to a list of strings written in flow style.
    pub fn set_top_level_flow_list(&mut self, key: &str, values: &[String]) -> bool {
        let items: Vec<String> = values
            .iter()
            .map(|v| render_scalar(v, Quote::Double))
            .collect();
        self.set_top_level_inline(key, &format!("[{}]", items.join(", ")))
    }

    /// Replaces the value of `key` with an already rendered inline value.
    /// A block value below the key is removed.
    fn set_top_level_inline(&mut self, key: &str, rendered: &str) -> bool {
        let before = self.lines.clone();
        match self.top_level(key) {
            Some(header) => {
                let end = self.block_end(header, true);
                let col = key_value_offset(&self.lines[header], 0).unwrap_or(key.len() + 1);
                let (_, comment) = split_comment(&self.lines[header][col..]);
                let comment = comment.to_string();
                let head = self.lines[header][..col].to_string();
                self.lines[header] = format!("{head} {rendered}{comment}");
                self.lines.drain(header + 1..end);
            }
            None => self.lines.push(format!("{key}: {rendered}")),
        }
        self.lines != before
    }

    /// For every item of the top-level sequence `seq_key` that declares
    /// `field`, offers the current (decoded) value to `rewrite`; a returned
    /// value replaces it. Items without `field` are never touched.
    /// Items in flow style are not visited.
    pub fn rewrite_item_field<F>(
        &mut self,
        seq_key: &str,
        field: &str,
        mut rewrite: F,
    ) -> Result<FieldRewrite, EditError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let Some(header) = self.top_level(seq_key) else {
            return Ok(FieldRewrite::default());
        };
        let end = self.block_end(header, true);
        let mut result = FieldRewrite::default();

        for (start, stop) in self.sequence_items(header + 1, end) {
            let Some(column) = self.item_column(start, stop) else {
                continue;
            };
            for idx in start..stop {
                let Some(col) = content_column(&self.lines[idx]) else {
                    continue;
                };
                if col != column || key_at(&self.lines[idx], col).as_deref() != Some(field) {
                    continue;
                }
                let Some((raw, value_col)) = self.inline_value(idx, col) else {
                    return Err(EditError::UnsupportedLayout {
                        key: format!("{seq_key}.{field}"),
                        reason: "value is not an inline scalar",
                    });
                };
                result.visited += 1;
                let current = decode_scalar(raw);
                if let Some(new_value) = rewrite(&current) {
                    if new_value != current {
                        let rendered = render_scalar(&new_value, quote_of(raw));
                        let line = &self.lines[idx];
                        let (_, comment) = split_comment(&line[value_col..]);
                        let updated = format!("{} {rendered}{comment}", &line[..value_col]);
                        self.lines[idx] = updated;
                        result.changed += 1;
                    }
                }
            }
        }
        Ok(result)
    }

    /// Appends a string to the top-level sequence `key`, creating the key
    /// when absent.
    pub fn append_to_sequence(&mut self, key: &str, value: &str) -> Result<(), EditError> {
        let Some(header) = self.top_level(key) else {
            self.lines.push(format!("{key}:"));
            self.lines.push(format!("  - {}", render_scalar(value, Quote::Double)));
            return Ok(());
        };

        let value_col = key_value_offset(&self.lines[header], 0).unwrap_or(key.len() + 1);
        let (inline, _) = split_comment(&self.lines[header][value_col..]);
        let inline = inline.trim();

        if inline.starts_with('[') {
            if !inline.ends_with(']') {
                return Err(EditError::UnsupportedLayout {
                    key: key.to_string(),
                    reason: "multi-line flow sequence",
                });
            }
            let inner = inline[1..inline.len() - 1].trim();
            let quote = inner
                .split(',')
                .next()
                .map(|first| quote_of(first.trim()))
                .filter(|_| !inner.is_empty())
                .unwrap_or(Quote::Double);
            let item = render_scalar(value, quote);
            let list = if inner.is_empty() {
                format!("[{item}]")
            } else {
                format!("[{inner}, {item}]")
            };
            self.set_top_level_inline(key, &list);
            return Ok(());
        }

        if !inline.is_empty() && inline != "~" && inline != "null" {
            return Err(EditError::UnsupportedLayout {
                key: key.to_string(),
                reason: "value is not a sequence",
            });
        }

        let end = self.block_end(header, true);
        let items = self.sequence_items(header + 1, end);
        let (indent, quote) = match items.first() {
            Some(&(first, _)) => {
                let line = &self.lines[first];
                let quote = content_column(line)
                    .map(|col| quote_of(split_comment(&line[col..]).0.trim()))
                    .unwrap_or(Quote::Double);
                (indent_of(line), quote)
            }
            None => {
                if !inline.is_empty() {
                    self.set_top_level_inline(key, "");
                    self.lines[header] = self.lines[header].trim_end().to_string();
                }
                (2, Quote::Double)
            }
        };
        let insert_at = self.block_end(header, true);
        self.lines.insert(
            insert_at,
            format!("{}- {}", " ".repeat(indent), render_scalar(value, quote)),
        );
        Ok(())
    }

    /// Inserts or replaces the child `child` of the top-level mapping
    /// `parent` with `body` rendered in block style.
    pub fn upsert_mapping_child(
        &mut self,
        parent: &str,
        child: &str,
        body: &Mapping,
    ) -> Result<bool, EditError> {
        let before = self.lines.clone();
        let (header, child_indent) = self.open_mapping(parent)?;
        let rendered = render_child(child, body, child_indent)?;

        match self.mapping_child(header, child_indent, child) {
            Some((start, stop)) => {
                self.lines.splice(start..stop, rendered);
            }
            None => {
                let at = self.block_end(header, false);
                self.lines.splice(at..at, rendered);
            }
        }
        Ok(self.lines != before)
    }

    /// Removes the child `child` of the top-level mapping `parent`.
    /// Returns whether it was present.
    pub fn remove_mapping_child(&mut self, parent: &str, child: &str) -> bool {
        let Some(header) = self.top_level(parent) else {
            return false;
        };
        let end = self.block_end(header, false);
        let Some(child_indent) = self.first_content_indent(header + 1, end) else {
            return false;
        };
        let Some((start, stop)) = self.mapping_child(header, child_indent, child) else {
            return false;
        };
        self.lines.drain(start..stop);

        let end = self.block_end(header, false);
        if self.first_content_indent(header + 1, end).is_none() {
            self.set_top_level_inline(parent, "{}");
        }
        true
    }

    /// Ensures `parent` exists as a block mapping and returns its header
    /// line and the indentation of its children.
    fn open_mapping(&mut self, parent: &str) -> Result<(usize, usize), EditError> {
        let header = match self.top_level(parent) {
            Some(header) => header,
            None => {
                self.lines.push(format!("{parent}:"));
                return Ok((self.lines.len() - 1, 2));
            }
        };

        let value_col = key_value_offset(&self.lines[header], 0).unwrap_or(parent.len() + 1);
        let (inline, comment) = split_comment(&self.lines[header][value_col..]);
        match inline.trim() {
            "" => {}
            "{}" | "~" | "null" => {
                let comment = comment.to_string();
                self.lines[header] = format!("{}{comment}", &self.lines[header][..value_col]);
            }
            _ => {
                return Err(EditError::UnsupportedLayout {
                    key: parent.to_string(),
                    reason: "value is not a block mapping",
                })
            }
        }

        let end = self.block_end(header, false);
        let indent = self.first_content_indent(header + 1, end).unwrap_or(2);
        Ok((header, indent))
    }

    fn mapping_child(&self, header: usize, indent: usize, child: &str) -> Option<(usize, usize)> {
        let end = self.block_end(header, false);
        (header + 1..end)
            .find(|&idx| {
                let line = &self.lines[idx];
                is_content(line)
                    && indent_of(line) == indent
                    && key_at(line, indent).as_deref() == Some(child)
            })
            .map(|start| (start, self.block_end(start, false)))
    }

    /// Index of the top-level line declaring `key`.
    pub fn top_level(&self, key: &str) -> Option<usize> {
        self.lines.iter().position(|line| {
            is_content(line) && indent_of(line) == 0 && key_at(line, 0).as_deref() == Some(key)
        })
    }

    /// End (exclusive) of the block introduced by `header`: the line after
    /// the last content line indented deeper than the header. With
    /// `compact_seq`, dash lines at the header's own indentation also
    /// belong to the block (`key:\n- item`).
    fn block_end(&self, header: usize, compact_seq: bool) -> usize {
        let base = indent_of(&self.lines[header]);
        let mut end = header + 1;
        for idx in header + 1..self.lines.len() {
            let line = &self.lines[idx];
            if !is_content(line) {
                continue;
            }
            let indent = indent_of(line);
            if indent > base || (compact_seq && indent == base && is_dash(line)) {
                end = idx + 1;
            } else {
                break;
            }
        }
        end
    }

    /// Item ranges of the block sequence in `start..end`.
    fn sequence_items(&self, start: usize, end: usize) -> Vec<(usize, usize)> {
        let Some(dash_indent) = (start..end)
            .map(|idx| &self.lines[idx])
            .find(|line| is_content(line))
            .filter(|line| is_dash(line))
            .map(|line| indent_of(line))
        else {
            return Vec::new();
        };

        let starts: Vec<usize> = (start..end)
            .filter(|&idx| {
                let line = &self.lines[idx];
                is_content(line) && indent_of(line) == dash_indent && is_dash(line)
            })
            .collect();

        starts
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                let stop = starts.get(i + 1).copied().unwrap_or(end);
                (s, stop)
            })
            .collect()
    }

    /// Column of the keys of the mapping held by a sequence item.
    fn item_column(&self, start: usize, stop: usize) -> Option<usize> {
        (start..stop).find_map(|idx| content_column(&self.lines[idx]))
    }

    fn first_content_indent(&self, start: usize, end: usize) -> Option<usize> {
        (start..end)
            .map(|idx| &self.lines[idx])
            .find(|line| is_content(line))
            .map(|line| indent_of(line))
    }

    /// Raw inline value of the key starting at `col` on `line`, with the
    /// byte offset just past the colon. `None` when the value continues
    /// on following lines.
    fn inline_value(&self, line: usize, col: usize) -> Option<(&str, usize)> {
        let text = &self.lines[line];
        let value_col = key_value_offset(text, col)?;
        let (value, _) = split_comment(&text[value_col..]);
        let value = value.trim();
        if value.is_empty() || value.starts_with('|') || value.starts_with('>') {
            None
        } else {
            Some((value, value_col))
        }
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn is_content(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

fn is_dash(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed == "-" || trimmed.starts_with("- ")
}

/// Column where a line's own content starts, looking past a leading dash.
fn content_column(line: &str) -> Option<usize> {
    if !is_content(line) {
        return None;
    }
    let indent = indent_of(line);
    if is_dash(line) {
        let after = &line[indent + 1..];
        let rest = after.trim_start();
        if rest.is_empty() || rest.starts_with('#') {
            return None;
        }
        Some(indent + 1 + after.len() - rest.len())
    } else {
        Some(indent)
    }
}

/// Decoded mapping key written at `col`, if the line holds one there.
fn key_at(line: &str, col: usize) -> Option<String> {
    let text = line.get(col..)?;
    let end = key_end(text)?;
    let raw = text[..end].trim_end();
    Some(decode_scalar(raw))
}

/// Byte offset, relative to the line, just past the key's colon.
fn key_value_offset(line: &str, col: usize) -> Option<usize> {
    let text = line.get(col..)?;
    key_end(text).map(|end| col + end + 1)
}

/// Offset of the colon ending a mapping key at the start of `text`.
fn key_end(text: &str) -> Option<usize> {
    if text.starts_with('-') || text.starts_with('#') || text.starts_with('[') || text.starts_with('{') {
        return None;
    }
    let bytes = text.as_bytes();
    let mut idx = 0;
    if let Some(&q) = bytes.first().filter(|b| matches!(b, b'"' | b'\'')) {
        idx = 1;
        while idx < bytes.len() && bytes[idx] != q {
            if q == b'"' && bytes[idx] == b'\\' {
                idx += 1;
            }
            idx += 1;
        }
        idx += 1;
    }
    while idx < bytes.len() {
        if bytes[idx] == b':' && (idx + 1 == bytes.len() || bytes[idx + 1] == b' ') {
            return Some(idx);
        }
        if bytes[idx] == b'#' && idx > 0 && bytes[idx - 1] == b' ' {
            return None;
        }
        idx += 1;
    }
    None
}

/// Splits an inline value from a trailing ` # comment`.
fn split_comment(text: &str) -> (&str, &str) {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    let mut idx = 0;
    while idx < bytes.len() {
        let b = bytes[idx];
        match quote {
            Some(b'"') if b == b'\\' => idx += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'#' && (idx == 0 || bytes[idx - 1] == b' ') => {
                let start = text[..idx].trim_end().len();
                return (&text[..start], &text[start..]);
            }
            None => {}
        }
        idx += 1;
    }
    (text.trim_end(), "")
}

fn quote_of(raw: &str) -> Quote {
    match raw.as_bytes().first() {
        Some(b'"') => Quote::Double,
        Some(b'\'') => Quote::Single,
        _ => Quote::Plain,
    }
}

fn decode_scalar(raw: &str) -> String {
    match serde_yaml::from_str::<Value>(raw) {
        Ok(Value::String(s)) => s,
        _ => raw.trim_matches(|c| c == '"' || c == '\'').to_string(),
    }
}

/// Renders `value` in the requested style. Plain style falls back to double
/// quotes when the plain text would not read back as the same string.
fn render_scalar(value: &str, quote: Quote) -> String {
    match quote {
        Quote::Plain if reads_back_plain(value) => value.to_string(),
        Quote::Single => format!("'{}'", value.replace('\'', "''")),
        _ => {
            let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{escaped}\"")
        }
    }
}

fn reads_back_plain(value: &str) -> bool {
    !value.is_empty()
        && !value.contains(" #")
        && !value.contains(": ")
        && matches!(serde_yaml::from_str::<Value>(value), Ok(Value::String(ref s)) if s == value)
}

/// Renders `child: body` at `indent`, shifting serde_yaml's block output.
fn render_child(child: &str, body: &Mapping, indent: usize) -> Result<Vec<String>, EditError> {
    let pad = " ".repeat(indent);
    let key = render_scalar(child, Quote::Plain);
    if body.is_empty() {
        return Ok(vec![format!("{pad}{key}: {{}}")]);
    }

    let text = serde_yaml::to_string(body).map_err(|e| EditError::Render {
        key: child.to_string(),
        reason: e.to_string(),
    })?;
    let mut lines = vec![format!("{pad}{key}:")];
    lines.extend(
        text.lines()
            .filter(|line| *line != "---")
            .map(|line| format!("{pad}  {line}")),
    );
    Ok(lines)
}
