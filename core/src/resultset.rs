use common::column::ColumnDefinition;
use common::err::{CResult, ReError};
use common::row::Row;

/// States a Resultset's cursor moves through (C5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsetState {
    /// constructed, `next()` not yet called.
    Pristine,
    /// a Row is currently live.
    Positioned,
    /// the cursor has been advanced past the last Row.
    Exhausted,
    /// the backend reported a failure while fetching.
    Errored,
}

/// Owns the cursor over a Statement's rows. Exactly one Row is live at a
/// time; advancing invalidates the previous Row unless the backend buffers
/// results, in which case prior rows remain valid (C5).
pub trait Resultset {
    fn state(&self) -> ResultsetState;

    /// Column metadata for this resultset, stable across the whole
    /// iteration.
    fn columns(&self) -> &[ColumnDefinition];

    /// Advances the cursor, returning the next Row or `None` at
    /// exhaustion. Only forward-only backends may invalidate the
    /// previously returned Row's borrow; this trait always returns an
    /// owned `Row` to keep both modes behind one signature (see
    /// `RowCursor` for the in-process adapter that preserves that
    /// distinction for random-access callers).
    fn next(&mut self) -> CResult<Option<Row>>;

    /// True once `next()` has returned a Row and that Row has not been
    /// invalidated by a subsequent `next()` call on a forward-only
    /// backend.
    fn is_valid(&self) -> bool;
}

/// In-process adapter unifying buffered (`Vec<Row>` + position index) and
/// streaming (`Iterator<Item = CResult<Row>>`) backends behind one type, so
/// callers never match on mode (SPEC_FULL §4.5).
pub enum RowCursor {
    Buffered { rows: Vec<Row>, position: Option<usize> },
    Streaming { iter: Box<dyn Iterator<Item = CResult<Row>> + Send>, current: Option<Row> },
}

impl RowCursor {
    pub fn buffered(rows: Vec<Row>) -> Self {
        RowCursor::Buffered { rows, position: None }
    }

    pub fn streaming(iter: impl Iterator<Item = CResult<Row>> + Send + 'static) -> Self {
        RowCursor::Streaming { iter: Box::new(iter), current: None }
    }

    pub fn state(&self) -> ResultsetState {
        match self {
            RowCursor::Buffered { rows, position } => match position {
                None => ResultsetState::Pristine,
                Some(p) if *p < rows.len() => ResultsetState::Positioned,
                Some(_) => ResultsetState::Exhausted,
            },
            RowCursor::Streaming { current, .. } => {
                if current.is_some() {
                    ResultsetState::Positioned
                } else {
                    ResultsetState::Pristine
                }
            }
        }
    }

    /// Advances and returns a reference to the current Row, or `None` at
    /// exhaustion. Buffered mode retains every prior row (random access via
    /// `row_at`); streaming mode drops the previous row on each call.
    pub fn advance(&mut self) -> CResult<Option<&Row>> {
        match self {
            RowCursor::Buffered { rows, position } => {
                let next_pos = position.map(|p| p + 1).unwrap_or(0);
                *position = Some(next_pos);
                Ok(rows.get(next_pos))
            }
            RowCursor::Streaming { iter, current } => match iter.next() {
                Some(Ok(row)) => {
                    *current = Some(row);
                    Ok(current.as_ref())
                }
                Some(Err(e)) => {
                    *current = None;
                    Err(e)
                }
                None => {
                    *current = None;
                    Ok(None)
                }
            },
        }
    }

    /// Random access by absolute position; only valid for buffered
    /// resultsets (streaming backends have already dropped earlier rows).
    pub fn row_at(&self, index: usize) -> CResult<&Row> {
        match self {
            RowCursor::Buffered { rows, .. } => rows
                .get(index)
                .ok_or(ReError::RecordNotFound),
            RowCursor::Streaming { .. } => {
                Err(ReError::Unsupported("random access on a streaming resultset"))
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.state(), ResultsetState::Positioned)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::value::Value;
    use std::sync::Arc;

    fn row(v: i64) -> Row {
        Row::new(vec![Some(Value::Integer(v))], Arc::from(vec![]))
    }

    #[test]
    fn buffered_cursor_retains_prior_rows() {
        let mut cursor = RowCursor::buffered(vec![row(1), row(2)]);
        assert_eq!(cursor.state(), ResultsetState::Pristine);
        cursor.advance().unwrap();
        cursor.advance().unwrap();
        assert!(cursor.is_valid());
        assert_eq!(cursor.row_at(0).unwrap().at(0).unwrap(), Some(&Value::Integer(1)));
        assert!(cursor.advance().unwrap().is_none());
        assert_eq!(cursor.state(), ResultsetState::Exhausted);
    }

    #[test]
    fn streaming_cursor_drops_prior_row_and_rejects_random_access() {
        let rows: Vec<CResult<Row>> = vec![Ok(row(1)), Ok(row(2))];
        let mut cursor = RowCursor::streaming(rows.into_iter());
        cursor.advance().unwrap();
        assert!(cursor.row_at(0).is_err());
        cursor.advance().unwrap();
        assert!(cursor.advance().unwrap().is_none());
    }
}
