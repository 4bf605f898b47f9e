//! Side-car batch table produced by the IFC builder (C6): a columnar table
//! of per-element properties, one row per mesh with geometry, plus a
//! reverse-lookup mapping keyed by `globalId + batchId`.

use serde_json::Value;
use std::collections::BTreeMap;

/// Columnar per-feature metadata. Every column has the same length, equal to
/// the number of rows appended so far (spec.md §3's equal-length invariant);
/// a row that doesn't mention a column gets an empty string in that column,
/// and a brand new column backfills every earlier row the same way.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct BatchTable {
    pub columns: BTreeMap<String, Vec<Value>>,
    row_count: usize,
}

impl BatchTable {
    pub fn new() -> Self {
        BatchTable::default()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Appends one row. `batch_id` becomes the `batchId` column; `fields`
    /// supplies every other column for this row.
    pub fn push_row(&mut self, batch_id: usize, fields: &BTreeMap<String, Value>) {
        for (key, value) in fields {
            self.columns
                .entry(key.clone())
                .or_insert_with(|| vec![Value::String(String::new()); self.row_count])
                .push(value.clone());
        }
        self.columns
            .entry("batchId".to_string())
            .or_insert_with(|| vec![Value::String(String::new()); self.row_count])
            .push(Value::from(batch_id as u64));

        self.row_count += 1;
        for column in self.columns.values_mut() {
            if column.len() < self.row_count {
                column.push(Value::String(String::new()));
            }
        }
    }
}

/// Reverse lookup from `globalId + batchId` to that row's full field set,
/// including the batchId itself.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct BatchTableMapping(pub BTreeMap<String, BTreeMap<String, Value>>);

impl BatchTableMapping {
    pub fn new() -> Self {
        BatchTableMapping::default()
    }

    pub fn insert_row(&mut self, global_id: &str, batch_id: usize, fields: &BTreeMap<String, Value>) {
        let mut row = fields.clone();
        row.insert("batchId".to_string(), Value::from(batch_id as u64));
        self.0.insert(format!("{global_id}{batch_id}"), row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_stay_equal_length_across_new_keys() {
        let mut table = BatchTable::new();
        let mut row0 = BTreeMap::new();
        row0.insert("globalId".to_string(), Value::String("A".into()));
        table.push_row(0, &row0);

        let mut row1 = BTreeMap::new();
        row1.insert("globalId".to_string(), Value::String("B".into()));
        row1.insert("wbs".to_string(), Value::String("1.2.3".into()));
        table.push_row(1, &row1);

        assert_eq!(table.columns["globalId"].len(), 2);
        assert_eq!(table.columns["wbs"].len(), 2);
        assert_eq!(table.columns["wbs"][0], Value::String(String::new()));
        assert_eq!(table.columns["batchId"], vec![Value::from(0u64), Value::from(1u64)]);
    }

    #[test]
    fn mapping_keys_concatenate_global_id_and_batch_id() {
        let mut mapping = BatchTableMapping::new();
        let mut fields = BTreeMap::new();
        fields.insert("wbs".to_string(), Value::String("1.2.3".into()));
        mapping.insert_row("2O2Fr$t4X7Zf8NOew3FNr2", 5, &fields);

        let row = &mapping.0["2O2Fr$t4X7Zf8NOew3FNr25"];
        assert_eq!(row["wbs"], Value::String("1.2.3".into()));
        assert_eq!(row["batchId"], Value::from(5u64));
    }
}
