//! Result relay: the last hop between the remote cursor and the caller.

use tracing::debug;

use crate::connector::RowCursor;
use crate::error::BridgeResult;
use crate::sink::ResultSink;
use crate::value::Value;

/// Forward every row of `cursor` to `sink`. Returns the number of rows delivered.
pub fn relay_rows(cursor: &mut dyn RowCursor, sink: &mut dyn ResultSink) -> BridgeResult<u64> {
    let sent = sink.send(cursor)?;
    debug!(target: "execbridge::exec", rows = sent, "stream relayed");
    Ok(sent)
}

/// Scalar handoff: no row and a database null both come back as `None`.
pub fn relay_scalar(value: Option<Value>) -> Option<String> {
    value.and_then(|v| v.to_text())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_nulls_and_values() {
        assert_eq!(relay_scalar(None), None);
        assert_eq!(relay_scalar(Some(Value::Null)), None);
        assert_eq!(relay_scalar(Some(Value::Int(42))).as_deref(), Some("42"));
        assert_eq!(relay_scalar(Some(Value::Text(String::new()))).as_deref(), Some(""));
    }
}
