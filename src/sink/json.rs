use std::io::Write;

use serde_json::json;

use crate::error::{BridgeError, BridgeResult};
use crate::value::{Column, Value};

use super::ResultSink;

/// Streams a result as JSON lines: a `{"columns": [...]}` header, one array per row, and a
/// `{"rows": n}` trailer. Each line is flushed as written so consumers see rows as they arrive.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self { Self { out } }

    pub fn into_inner(self) -> W { self.out }

    fn write_line(&mut self, line: &serde_json::Value) -> BridgeResult<()> {
        serde_json::to_writer(&mut self.out, line).map_err(|e| BridgeError::sink(e.to_string()))?;
        self.out.write_all(b"\n").map_err(|e| BridgeError::sink(e.to_string()))?;
        self.out.flush().map_err(|e| BridgeError::sink(e.to_string()))
    }
}

impl<W: Write> ResultSink for JsonLinesSink<W> {
    fn start(&mut self, columns: &[Column]) -> BridgeResult<()> {
        self.write_line(&json!({ "columns": columns }))
    }

    fn row(&mut self, row: &[Value]) -> BridgeResult<()> {
        self.write_line(&json!(row))
    }

    fn finish(&mut self, rows: u64) -> BridgeResult<()> {
        self.write_line(&json!({ "rows": rows }))
    }
}
