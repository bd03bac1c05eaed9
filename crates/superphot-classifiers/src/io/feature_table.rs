//! Tab-separated feature table reader.
//!
//! One row per posterior draw: a group column (object name), an optional label
//! column, metadata columns and numeric feature columns.
use std::collections::HashSet;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::StringRecord;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::data_handling::{is_missing_token, Dataset, MetaValue, MetadataSchema, RowMetadata};
use crate::math::Array2;

/// Configuration for reading feature tables. Stored with a trained pipeline
/// so that later runs read tables with the training layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableReaderConfig {
    /// Column holding the object name shared by all draws of an object.
    pub group_column: String,
    /// Column holding the class label. May be absent from the file.
    pub label_column: String,
    /// Metadata columns carried through to results when present.
    pub metadata_columns: Vec<String>,
    /// Optional list of feature columns to load (in order).
    /// When `None`, every other column is a feature.
    pub feature_columns: Option<Vec<String>>,
    /// Columns to ignore when auto-selecting features.
    pub ignore_columns: Vec<String>,
    pub delimiter: u8,
}

impl Default for TableReaderConfig {
    fn default() -> Self {
        Self {
            group_column: "filename".to_string(),
            label_column: "type".to_string(),
            metadata_columns: vec!["redshift".to_string(), "MWEBV".to_string()],
            feature_columns: None,
            ignore_columns: Vec::new(),
            delimiter: b'\t',
        }
    }
}

/// Read a feature table with the default layout.
pub fn read_feature_table<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    read_feature_table_with_config(path, &TableReaderConfig::default())
}

pub fn read_feature_table_with_config<P: AsRef<Path>>(
    path: P,
    config: &TableReaderConfig,
) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(&path)
        .with_context(|| format!("Failed to open feature table: {}", path.as_ref().display()))?;

    let headers = reader
        .headers()
        .context("Failed to read feature table header row")?
        .clone();

    let group_idx = find_column(&headers, &config.group_column)
        .ok_or_else(|| anyhow!("Missing group column '{}'", config.group_column))?;
    let label_idx = find_column(&headers, &config.label_column);
    if label_idx.is_none() {
        debug!(
            "No '{}' column; rows will be unlabelled",
            config.label_column
        );
    }

    let mut meta_indices = Vec::new();
    let mut meta_names = Vec::new();
    for name in &config.metadata_columns {
        if let Some(idx) = find_column(&headers, name) {
            meta_indices.push(idx);
            meta_names.push(headers.get(idx).unwrap_or(name).to_string());
        }
    }

    let mut reserved: HashSet<usize> = meta_indices.iter().copied().collect();
    reserved.insert(group_idx);
    if let Some(idx) = label_idx {
        reserved.insert(idx);
    }
    let feature_indices = resolve_feature_indices(&headers, config, &reserved)?;
    if feature_indices.is_empty() {
        return Err(anyhow!("No feature columns detected in feature table header"));
    }

    let mut features = Vec::new();
    let mut metadata = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let line = row_idx + 2;
        let record = result.with_context(|| format!("Failed to read line {}", line))?;

        let group = record
            .get(group_idx)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow!("Missing group value at line {}", line))?
            .to_string();
        let label = label_idx
            .and_then(|idx| record.get(idx))
            .filter(|v| !is_missing_token(v))
            .map(str::to_string);
        let fields = meta_indices
            .iter()
            .map(|&idx| MetaValue::parse(record.get(idx).unwrap_or("")))
            .collect();
        metadata.push(RowMetadata {
            group,
            label,
            fields,
        });

        for &idx in &feature_indices {
            let value = record
                .get(idx)
                .ok_or_else(|| anyhow!("Missing feature value at line {}", line))?;
            let parsed = value.parse::<f64>().with_context(|| {
                format!(
                    "Invalid feature '{}' at line {}",
                    headers.get(idx).unwrap_or(""),
                    line
                )
            })?;
            features.push(parsed);
        }
    }

    let x = Array2::from_shape_vec((metadata.len(), feature_indices.len()), features)
        .context("Failed to build feature matrix")?;
    let feature_names = feature_indices
        .iter()
        .map(|&idx| headers.get(idx).unwrap_or("").to_string())
        .collect();
    let schema = MetadataSchema {
        group_column: config.group_column.clone(),
        label_column: config.label_column.clone(),
        fields: meta_names,
    };

    let dataset = Dataset::new(x, metadata, feature_names, schema)?;
    info!(
        "Read {} rows with {} features from {}",
        dataset.len(),
        dataset.n_features(),
        path.as_ref().display()
    );
    Ok(dataset)
}

pub(crate) fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.eq_ignore_ascii_case(name))
}

fn resolve_feature_indices(
    headers: &StringRecord,
    config: &TableReaderConfig,
    reserved: &HashSet<usize>,
) -> Result<Vec<usize>> {
    if let Some(names) = &config.feature_columns {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let idx = find_column(headers, name)
                .ok_or_else(|| anyhow!("Missing feature column '{}'", name))?;
            indices.push(idx);
        }
        return Ok(indices);
    }

    let ignore: HashSet<String> = config
        .ignore_columns
        .iter()
        .map(|name| name.to_ascii_lowercase())
        .collect();

    Ok(headers
        .iter()
        .enumerate()
        .filter(|(idx, header)| {
            !reserved.contains(idx) && !ignore.contains(&header.to_ascii_lowercase())
        })
        .map(|(idx, _)| idx)
        .collect())
}
