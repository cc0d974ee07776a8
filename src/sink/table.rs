use std::io::Write;
use std::time::Instant;

use terminal_size::{terminal_size, Height, Width};

use crate::error::{BridgeError, BridgeResult};
use crate::value::{Column, Value};

use super::ResultSink;

const MIN_COL_WIDTH: usize = 8;
const MAX_COL_WIDTH: usize = 40;

// Render rows as an ASCII table while they stream in. Column widths are fixed when the
// header is written (rows are never buffered), so long cells are truncated with an ellipsis.
pub struct TableSink<W: Write> {
    out: W,
    widths: Vec<usize>,
    started_at: Option<Instant>,
    max_width: usize,
}

impl<W: Write> TableSink<W> {
    pub fn new(out: W) -> Self { Self::with_max_width(out, get_terminal_width()) }

    pub fn with_max_width(out: W, max_width: usize) -> Self {
        Self { out, widths: Vec::new(), started_at: None, max_width: max_width.max(20) }
    }

    pub fn into_inner(self) -> W { self.out }

    fn line(&mut self, s: &str) -> BridgeResult<()> {
        writeln!(self.out, "{}", s).map_err(|e| BridgeError::sink(e.to_string()))
    }
}

impl<W: Write> ResultSink for TableSink<W> {
    fn start(&mut self, columns: &[Column]) -> BridgeResult<()> {
        self.started_at = Some(Instant::now());
        let n = columns.len().max(1);
        // Each cell costs its width plus three characters of padding and border.
        let budget = (self.max_width.saturating_sub(1) / n).saturating_sub(3).clamp(MIN_COL_WIDTH, MAX_COL_WIDTH);
        self.widths = columns.iter().map(|c| visible_len(&c.name).clamp(MIN_COL_WIDTH, budget)).collect();
        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let sep = build_separator(&self.widths);
        let header = build_row(&names, &self.widths, false);
        self.line(&sep)?;
        self.line(&header)?;
        self.line(&sep)
    }

    fn row(&mut self, row: &[Value]) -> BridgeResult<()> {
        let cells: Vec<String> = row.iter().map(to_cell_string).collect();
        let line = build_row(&cells, &self.widths, true);
        self.line(&line)
    }

    fn finish(&mut self, rows: u64) -> BridgeResult<()> {
        let sep = build_separator(&self.widths);
        self.line(&sep)?;
        let mut summary = format!("rows: {}, cols: {}", rows, self.widths.len());
        if let Some(started) = self.started_at {
            summary.push_str(&format!(", elapsed_ms: {}", started.elapsed().as_millis()));
        }
        self.line(&summary)?;
        self.out.flush().map_err(|e| BridgeError::sink(e.to_string()))
    }
}

fn to_cell_string(v: &Value) -> String {
    v.to_text().unwrap_or_else(|| String::from("NULL"))
}

fn build_separator(widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('+');
    for w in widths {
        s.push_str(&"-".repeat(*w + 2));
        s.push('+');
    }
    s
}

fn build_row(cells: &[String], widths: &[usize], align_numbers: bool) -> String {
    let mut s = String::new();
    s.push('|');
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).map(String::as_str).unwrap_or_default();
        let text = truncate(cell, *w);
        let pad = w.saturating_sub(visible_len(&text));
        s.push(' ');
        if align_numbers && is_numeric_like(cell) {
            s.push_str(&" ".repeat(pad));
            s.push_str(&text);
        } else {
            s.push_str(&text);
            s.push_str(&" ".repeat(pad));
        }
        s.push(' ');
        s.push('|');
    }
    s
}

fn truncate(s: &str, max: usize) -> String {
    let len = s.chars().count();
    if len <= max { return s.to_string(); }
    if max <= 1 { return "…".to_string(); }
    s.chars().take(max - 1).collect::<String>() + "…"
}

fn is_numeric_like(s: &str) -> bool {
    // crude detection for aligning numbers to right
    let st = s.trim();
    if st.is_empty() { return false; }
    let mut has_digit = false;
    for ch in st.chars() {
        if ch.is_ascii_digit() { has_digit = true; continue; }
        if ".-+eE,_".contains(ch) { continue; }
        return false;
    }
    has_digit
}

fn visible_len(s: &str) -> usize { s.chars().count() }

fn get_terminal_width() -> usize {
    match terminal_size() {
        Some((Width(w), Height(_))) => (w as usize).saturating_sub(4),
        None => 80,
    }
}
