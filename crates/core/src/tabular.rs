use std::fs;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;

use crate::error::Result;

pub const CONTROL_OK: &str = "ok";

/// One physical line of an import file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub line: usize,
    pub cells: Vec<String>,
}

impl ImportRow {
    pub fn new(line: usize, cells: Vec<String>) -> Self {
        Self { line, cells }
    }

    pub fn from_cells<S: AsRef<str>>(line: usize, cells: &[S]) -> Self {
        Self::new(line, cells.iter().map(|cell| cell.as_ref().to_string()).collect())
    }

    pub fn control_flag(&self) -> &str {
        self.cells.first().map(String::as_str).unwrap_or("")
    }

    /// Rows flagged anything other than `ok` are drafts and never imported.
    pub fn is_importable(&self) -> bool {
        self.control_flag().to_lowercase() == CONTROL_OK
    }

    /// Cells after the control flag.
    pub fn content(&self) -> &[String] {
        self.cells.get(1..).unwrap_or(&[])
    }
}

pub fn read_rows(path: &Path) -> Result<Vec<ImportRow>> {
    let file = fs::File::open(path)?;
    read_rows_from(file)
}

/// Comma-delimited, header-agnostic reader. Empty lines are skipped and row
/// lengths are left for the validator to judge. Line numbers are physical,
/// so skipped blank lines still count.
pub fn read_rows_from<R: Read>(mut reader: R) -> Result<Vec<ImportRow>> {
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw)?;
    let mut csv = ReaderBuilder::new()
        .delimiter(b',')
        .has_headers(false)
        .flexible(true)
        .from_reader(raw.as_slice());
    let mut lines = LineCounter::new(&raw);
    let mut rows = Vec::new();
    for record in csv.records() {
        let record = record?;
        let line = match record.position() {
            Some(pos) => lines.line_at(pos.byte() as usize),
            None => rows.len() + 1,
        };
        rows.push(ImportRow::new(
            line,
            record.iter().map(|cell| cell.to_string()).collect(),
        ));
    }
    Ok(rows)
}

/// Maps record start offsets to 1-based line numbers. Offsets must be
/// visited in increasing order.
struct LineCounter<'a> {
    raw: &'a [u8],
    offset: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    fn new(raw: &'a [u8]) -> Self {
        Self {
            raw,
            offset: 0,
            line: 1,
        }
    }

    fn line_at(&mut self, byte: usize) -> usize {
        let byte = byte.clamp(self.offset, self.raw.len());
        self.line += self.raw[self.offset..byte]
            .iter()
            .filter(|b| **b == b'\n')
            .count();
        // A record position may point at the blank lines skipped before it.
        let mut at = byte;
        while let Some(b) = self.raw.get(at).filter(|b| matches!(**b, b'\r' | b'\n')) {
            if *b == b'\n' {
                self.line += 1;
            }
            at += 1;
        }
        self.offset = at;
        self.line
    }
}
