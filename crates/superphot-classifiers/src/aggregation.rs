//! Collapse repeated posterior draws of the same object into one row.

use std::collections::BTreeMap;

use log::debug;

use crate::data_handling::{ProbabilityRow, ProbabilityTable, RowMetadata};

/// Average the probability vectors of rows that share their full metadata
/// tuple (group, label and every metadata field).
///
/// Output rows are ordered by that tuple. Applying this to an already
/// aggregated table returns it unchanged.
pub fn aggregate_probabilities(table: &ProbabilityTable) -> ProbabilityTable {
    let n_classes = table.classes.len();
    let mut groups: BTreeMap<&RowMetadata, (Vec<f64>, usize)> = BTreeMap::new();
    for row in &table.rows {
        let (sum, count) = groups
            .entry(&row.metadata)
            .or_insert_with(|| (vec![0.0; n_classes], 0));
        for (s, p) in sum.iter_mut().zip(&row.probabilities) {
            *s += p;
        }
        *count += 1;
    }

    let rows: Vec<ProbabilityRow> = groups
        .into_iter()
        .map(|(metadata, (sum, count))| ProbabilityRow {
            metadata: metadata.clone(),
            probabilities: sum.into_iter().map(|s| s / count as f64).collect(),
        })
        .collect();

    debug!(
        "Aggregated {} rows into {} objects",
        table.rows.len(),
        rows.len()
    );

    ProbabilityTable {
        classes: table.classes.clone(),
        schema: table.schema.clone(),
        rows,
    }
}
