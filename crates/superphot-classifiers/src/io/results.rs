//! Fixed-width two-line result tables.
//!
//! Layout: a header line, a line of dashes marking each column's extent, then
//! one line per row. Metadata columns come first, then one probability column
//! per class. Numeric metadata is printed with 4 decimals, probabilities with 3.
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::info;

use crate::data_handling::{MetaValue, MetadataSchema, ProbabilityRow, ProbabilityTable, RowMetadata};
use crate::io::feature_table::TableReaderConfig;

const MISSING: &str = "--";

fn metadata_cells(row: &RowMetadata) -> Vec<String> {
    let mut cells = vec![
        row.group.clone(),
        row.label.clone().unwrap_or_else(|| MISSING.to_string()),
    ];
    cells.extend(row.fields.iter().map(|v| match v {
        MetaValue::Number(_) => format!("{:.4}", v),
        other => other.to_string(),
    }));
    cells
}

/// Render a table in the fixed-width two-line layout.
pub fn format_results(table: &ProbabilityTable) -> String {
    let mut header: Vec<String> = table
        .schema
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    header.extend(table.classes.iter().cloned());

    let body: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            let mut cells = metadata_cells(&row.metadata);
            cells.extend(row.probabilities.iter().map(|p| format!("{:.3}", p)));
            cells
        })
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|c| {
            body.iter()
                .map(|cells| cells[c].len())
                .chain(std::iter::once(header[c].len()))
                .max()
                .unwrap_or(1)
                .max(1)
        })
        .collect();

    let mut out = String::new();
    let render = |cells: &[String], out: &mut String| {
        let line: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:>w$}", cell, w = w))
            .collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    };
    render(&header, &mut out);
    let dashes: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    render(&dashes, &mut out);
    for cells in &body {
        render(cells, &mut out);
    }
    out
}

pub fn write_results<P: AsRef<Path>>(table: &ProbabilityTable, path: P) -> Result<()> {
    fs::write(&path, format_results(table))
        .with_context(|| format!("Failed to write results to {}", path.as_ref().display()))?;
    info!(
        "Classification results saved to {}",
        path.as_ref().display()
    );
    Ok(())
}

/// Byte ranges of each run of dashes in the separator line.
fn column_spans(dash_line: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, ch) in dash_line.char_indices() {
        match (ch == '-', start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                spans.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, dash_line.len()));
    }
    spans
}

fn cell(line: &str, span: (usize, usize)) -> &str {
    let end = span.1.min(line.len());
    line.get(span.0.min(end)..end).unwrap_or("").trim()
}

/// Parse the fixed-width layout. Columns named in `config` (group, label and
/// metadata columns) are metadata; every other column is a class probability.
pub fn parse_results(text: &str, config: &TableReaderConfig) -> Result<ProbabilityTable> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header_line = lines.next().ok_or_else(|| anyhow!("Results table is empty"))?;
    let dash_line = lines
        .next()
        .ok_or_else(|| anyhow!("Results table has no separator line"))?;
    let spans = column_spans(dash_line);
    let names: Vec<&str> = spans.iter().map(|&s| cell(header_line, s)).collect();

    let position = |name: &str| names.iter().position(|n| n.eq_ignore_ascii_case(name));
    let group_idx = position(&config.group_column)
        .ok_or_else(|| anyhow!("Missing group column '{}'", config.group_column))?;
    let label_idx = position(&config.label_column);
    let mut field_idx = Vec::new();
    let mut field_names = Vec::new();
    for name in &config.metadata_columns {
        if let Some(idx) = position(name) {
            field_idx.push(idx);
            field_names.push(names[idx].to_string());
        }
    }
    let class_idx: Vec<usize> = (0..names.len())
        .filter(|i| *i != group_idx && Some(*i) != label_idx && !field_idx.contains(i))
        .collect();
    let classes: Vec<String> = class_idx.iter().map(|&i| names[i].to_string()).collect();

    let mut rows = Vec::new();
    for (n, line) in lines.enumerate() {
        let line_no = n + 3;
        let label = label_idx
            .map(|i| cell(line, spans[i]))
            .filter(|v| !crate::data_handling::is_missing_token(v))
            .map(str::to_string);
        let metadata = RowMetadata {
            group: cell(line, spans[group_idx]).to_string(),
            label,
            fields: field_idx
                .iter()
                .map(|&i| MetaValue::parse(cell(line, spans[i])))
                .collect(),
        };
        let probabilities = class_idx
            .iter()
            .map(|&i| {
                let raw = cell(line, spans[i]);
                raw.parse::<f64>().with_context(|| {
                    format!("Invalid probability '{}' for {} at line {}", raw, names[i], line_no)
                })
            })
            .collect::<Result<Vec<_>>>()?;
        rows.push(ProbabilityRow {
            metadata,
            probabilities,
        });
    }

    let schema = MetadataSchema {
        group_column: names[group_idx].to_string(),
        label_column: label_idx
            .map(|i| names[i].to_string())
            .unwrap_or_else(|| config.label_column.clone()),
        fields: field_names,
    };
    Ok(ProbabilityTable::new(classes, schema, rows)?)
}

pub fn read_results<P: AsRef<Path>>(path: P, config: &TableReaderConfig) -> Result<ProbabilityTable> {
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read results from {}", path.as_ref().display()))?;
    parse_results(&text, config)
        .with_context(|| format!("Failed to parse results table {}", path.as_ref().display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ProbabilityTable {
        ProbabilityTable::new(
            vec!["SNII".into(), "SNIa".into()],
            MetadataSchema::with_fields(&["redshift", "MWEBV"]),
            vec![
                ProbabilityRow {
                    metadata: RowMetadata::new(
                        "PS1-10a",
                        Some("SNIa"),
                        vec![MetaValue::Number(0.12345), MetaValue::Number(0.03)],
                    ),
                    probabilities: vec![0.25, 0.75],
                },
                ProbabilityRow {
                    metadata: RowMetadata::new(
                        "PS1-10bcd",
                        None,
                        vec![MetaValue::Number(0.5), MetaValue::Missing],
                    ),
                    probabilities: vec![0.9, 0.1],
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn formats_fixed_width() {
        let text = format_results(&table());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], " filename type redshift  MWEBV  SNII  SNIa");
        assert_eq!(lines[1], "--------- ---- -------- ------ ----- -----");
        assert_eq!(lines[2], "  PS1-10a SNIa   0.1235 0.0300 0.250 0.750");
        assert_eq!(lines[3], "PS1-10bcd   --   0.5000     -- 0.900 0.100");
    }

    #[test]
    fn parses_what_it_writes() {
        let text = format_results(&table());
        let parsed = parse_results(&text, &TableReaderConfig::default()).unwrap();
        assert_eq!(parsed.classes, vec!["SNII", "SNIa"]);
        assert_eq!(parsed.schema.fields, vec!["redshift", "MWEBV"]);
        assert_eq!(parsed.rows[0].metadata.label.as_deref(), Some("SNIa"));
        assert_eq!(parsed.rows[1].metadata.label, None);
        assert_eq!(parsed.rows[1].metadata.fields[1], MetaValue::Missing);
        assert_eq!(parsed.rows[0].probabilities, vec![0.25, 0.75]);
    }
}
