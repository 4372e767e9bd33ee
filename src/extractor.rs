//! Line classification for CTD cast files.
//!
//! Every line of a member is classified by content, in a fixed order:
//! blank, comment or header, data row of the expected shape, and
//! finally rejected. Only data rows become [`RawRecord`]s; rejected lines
//! are counted.

use crate::constants::HEADER_KEYWORDS;
use crate::header::{is_comment_line, parse_number};
use crate::models::{Field, RawLine, RawRecord};
use std::iter::Enumerate;
use std::str::Lines;
use std::sync::Arc;

/// Expected type of one column in a data row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Must parse as a finite number
    Number,
    /// Number or empty
    OptionalNumber,
    /// Free text
    Text,
}

/// Shape of a valid data row and the bounds of the data section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowShape {
    pub kinds: Vec<FieldKind>,
    /// 0-based index of the first line that may hold data
    pub data_start: usize,
    /// 0-based index of the end marker; it and later lines are trailer
    pub data_end: Option<usize>,
}

impl RowShape {
    pub fn width(&self) -> usize {
        self.kinds.len()
    }
}

/// Classification of a single line
#[derive(Debug, Clone, PartialEq)]
pub enum LineClass {
    Blank,
    /// Comment, metadata, column header, units or trailer
    Comment,
    Data(Vec<Field>),
    Rejected,
}

/// Per-member line counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub lines: usize,
    pub blank: usize,
    pub comment: usize,
    pub accepted: usize,
    pub rejected: usize,
}

/// Separates data rows from everything else in a member's text
#[derive(Debug, Clone, Copy)]
pub struct RecordExtractor<'s> {
    shape: &'s RowShape,
}

impl<'s> RecordExtractor<'s> {
    pub fn new(shape: &'s RowShape) -> Self {
        Self { shape }
    }

    /// Classify one line
    pub fn classify(&self, line: RawLine<'_>) -> LineClass {
        let index = line.number - 1;
        let text = line.text;

        if text.trim().is_empty() {
            return LineClass::Blank;
        }

        if index < self.shape.data_start
            || self.shape.data_end.is_some_and(|end| index >= end)
            || is_comment_line(text)
            || (is_keyword_line(text) && !self.leads_with_text())
        {
            return LineClass::Comment;
        }

        match self.parse_row(text) {
            Some(fields) => LineClass::Data(fields),
            None => LineClass::Rejected,
        }
    }

    /// Lazily extract the data rows of one member
    pub fn extract<'t>(&self, member: &str, text: &'t str) -> Extraction<'s, 't> {
        Extraction {
            extractor: *self,
            member: Arc::from(member),
            lines: text.lines().enumerate(),
            stats: ExtractionStats::default(),
        }
    }

    /// A text first column can hold keyword-like values such as a station named `CTD`
    fn leads_with_text(&self) -> bool {
        self.shape.kinds.first() == Some(&FieldKind::Text)
    }

    fn parse_row(&self, text: &str) -> Option<Vec<Field>> {
        let width = self.shape.width();
        // A trailing comma only counts as a cell when the row needs one
        let mut tokens: Vec<&str> = text.split(',').map(str::trim).collect();
        if tokens.len() == width + 1 && tokens.last().is_some_and(|t| t.is_empty()) {
            tokens.pop();
        }
        if tokens.len() != width {
            return None;
        }

        tokens
            .into_iter()
            .zip(self.shape.kinds.iter())
            .map(|(token, kind)| match kind {
                FieldKind::Number => parse_number(token).map(Field::Number),
                FieldKind::OptionalNumber if token.is_empty() => Some(Field::Empty),
                FieldKind::OptionalNumber => parse_number(token).map(Field::Number),
                FieldKind::Text if token.is_empty() => Some(Field::Empty),
                FieldKind::Text => Some(Field::Text(token.to_string())),
            })
            .collect()
    }
}

/// Lines that open with a known header keyword or are `KEY = value`
fn is_keyword_line(text: &str) -> bool {
    let trimmed = text.trim_start();
    let ident_len = trimmed
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(trimmed.len());
    if ident_len == 0 {
        return false;
    }

    let (ident, rest) = trimmed.split_at(ident_len);
    let rest = rest.trim_start();
    if rest.starts_with('=') && ident.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return true;
    }

    (rest.is_empty() || rest.starts_with(',')) && HEADER_KEYWORDS.contains(&ident.to_ascii_uppercase().as_str())
}

/// Iterator over the data rows of one member
#[derive(Debug)]
pub struct Extraction<'s, 't> {
    extractor: RecordExtractor<'s>,
    member: Arc<str>,
    lines: Enumerate<Lines<'t>>,
    stats: ExtractionStats,
}

impl Extraction<'_, '_> {
    /// Counts so far; complete once the iterator is exhausted
    pub fn stats(&self) -> ExtractionStats {
        self.stats
    }
}

impl Iterator for Extraction<'_, '_> {
    type Item = RawRecord;

    fn next(&mut self) -> Option<RawRecord> {
        for (index, text) in self.lines.by_ref() {
            let line = RawLine {
                member: &self.member,
                number: index + 1,
                text,
            };
            self.stats.lines += 1;

            match self.extractor.classify(line) {
                LineClass::Blank => self.stats.blank += 1,
                LineClass::Comment => self.stats.comment += 1,
                LineClass::Rejected => {
                    self.stats.rejected += 1;
                    tracing::trace!("Rejected line {} of {}: {}", line.number, self.member, text);
                }
                LineClass::Data(fields) => {
                    self.stats.accepted += 1;
                    return Some(RawRecord {
                        fields,
                        member: Arc::clone(&self.member),
                        line_number: line.number,
                    });
                }
            }
        }
        None
    }
}
