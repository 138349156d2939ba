use std::sync::Arc;

use crate::column::ColumnDefinition;
use crate::err::ReError;
use crate::value::Value;

/// One materialized record: an ordered sequence of optional Values aligned
/// 1:1 with a shared column-definition slice. Shape grounded in the
/// teacher's `common::row::Row` (`values: Vec<Option<ColumnValue>>, columns:
/// Arc<[Column]>`), generalized from binlog row-images to resultset rows.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<Option<Value>>,
    columns: Arc<[ColumnDefinition]>,
}

impl Row {
    pub fn new(values: Vec<Option<Value>>, columns: Arc<[ColumnDefinition]>) -> Self {
        Row { values, columns }
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Ordinal lookup. `Ok(None)` means the cell is SQL NULL;
    /// `NoSuchColumn` means the ordinal is out of range.
    pub fn at(&self, ordinal: usize) -> Result<Option<&Value>, ReError> {
        self.values
            .get(ordinal)
            .map(|cell| cell.as_ref())
            .ok_or_else(|| ReError::NoSuchColumn(ordinal.to_string()))
    }

    /// Name lookup: case-sensitive exact match; if more than one column
    /// shares a name, the lowest ordinal wins.
    pub fn by_name(&self, name: &str) -> Result<Option<&Value>, ReError> {
        let ordinal = self
            .columns
            .iter()
            .filter(|c| c.name() == name)
            .map(|c| c.ordinal())
            .min()
            .ok_or_else(|| ReError::NoSuchColumn(name.to_string()))?;
        self.at(ordinal)
    }

    pub fn column_definition(&self, ordinal: usize) -> Option<&ColumnDefinition> {
        self.columns.get(ordinal)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::column::ColumnCategory;

    fn columns() -> Arc<[ColumnDefinition]> {
        Arc::from(vec![
            ColumnDefinition::new("id", 0, 0, ColumnCategory::Integer, false),
            ColumnDefinition::new("name", 1, 0, ColumnCategory::Text, true),
        ])
    }

    #[test]
    fn lookup_by_ordinal_and_name() {
        let row = Row::new(
            vec![Some(Value::Integer(1)), Some(Value::Text("Bryan".into()))],
            columns(),
        );

        assert_eq!(row.at(0).unwrap(), Some(&Value::Integer(1)));
        assert_eq!(row.by_name("name").unwrap(), Some(&Value::Text("Bryan".into())));
    }

    #[test]
    fn missing_column_is_reported() {
        let row = Row::new(vec![Some(Value::Integer(1)), None], columns());
        assert!(row.by_name("missing").is_err());
        assert!(row.at(5).is_err());
    }

    #[test]
    fn null_cell_is_ok_none_not_an_error() {
        let row = Row::new(vec![Some(Value::Integer(1)), None], columns());
        assert_eq!(row.at(1).unwrap(), None);
    }

    #[test]
    fn ambiguous_name_resolves_to_lowest_ordinal() {
        let cols: Arc<[ColumnDefinition]> = Arc::from(vec![
            ColumnDefinition::new("id", 0, 0, ColumnCategory::Integer, false),
            ColumnDefinition::new("id", 1, 0, ColumnCategory::Integer, false),
        ]);
        let row = Row::new(vec![Some(Value::Integer(1)), Some(Value::Integer(2))], cols);
        assert_eq!(row.by_name("id").unwrap(), Some(&Value::Integer(1)));
    }
}
