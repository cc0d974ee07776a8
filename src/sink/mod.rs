//! Result sinks: where streamed rows go.
//! The bridge hands a sink a live cursor and the sink pulls it to exhaustion, one row at
//! a time. Nothing here requires the full result set in memory (except `CollectSink`,
//! which exists for callers who explicitly want that).

use crate::connector::RowCursor;
use crate::error::BridgeResult;
use crate::value::{Column, Row, Value};

mod json;
mod table;

pub use json::JsonLinesSink;
pub use table::TableSink;

pub trait ResultSink {
    /// Called once, before any row, with the result's column layout.
    fn start(&mut self, columns: &[Column]) -> BridgeResult<()>;

    fn row(&mut self, row: &[Value]) -> BridgeResult<()>;

    /// Called once after the last row with the number of rows delivered.
    fn finish(&mut self, _rows: u64) -> BridgeResult<()> { Ok(()) }

    /// Drain `cursor` into this sink. Single pass; a failure mid-way abandons the rest and
    /// leaves whatever was already delivered in place.
    fn send(&mut self, cursor: &mut dyn RowCursor) -> BridgeResult<u64> {
        self.start(cursor.columns())?;
        let mut sent = 0u64;
        while let Some(row) = cursor.next_row()? {
            self.row(&row)?;
            sent += 1;
        }
        self.finish(sent)?;
        Ok(sent)
    }
}

/// Buffers everything it is sent.
#[derive(Debug, Default, Clone)]
pub struct CollectSink {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    pub finished: bool,
}

impl CollectSink {
    pub fn new() -> Self { Self::default() }

    /// Text form of every cell, with `None` for nulls.
    pub fn text_rows(&self) -> Vec<Vec<Option<String>>> {
        self.rows.iter().map(|r| r.iter().map(Value::to_text).collect()).collect()
    }
}

impl ResultSink for CollectSink {
    fn start(&mut self, columns: &[Column]) -> BridgeResult<()> {
        self.columns = columns.to_vec();
        self.rows.clear();
        self.finished = false;
        Ok(())
    }

    fn row(&mut self, row: &[Value]) -> BridgeResult<()> {
        self.rows.push(row.to_vec());
        Ok(())
    }

    fn finish(&mut self, _rows: u64) -> BridgeResult<()> {
        self.finished = true;
        Ok(())
    }
}
