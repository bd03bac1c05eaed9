//! Data structures for labelled feature tables and classification results.
//!
//! A `Dataset` holds one feature vector per row together with the row's
//! metadata: the group key (one group per object, with repeated posterior
//! draws sharing it), an optional class label and extra metadata fields such as
//! redshift. `ProbabilityTable` carries the same metadata next to one
//! probability vector per row.
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, Result};
use crate::math::Array2;

/// Tokens read as "no value" in label and metadata columns.
pub const MISSING_TOKENS: &[&str] = &["", "--", "nan", "none", "null", "n/a"];

pub fn is_missing_token(value: &str) -> bool {
    let value = value.trim();
    MISSING_TOKENS.iter().any(|t| value.eq_ignore_ascii_case(t))
}

/// A metadata cell. Numbers compare by total order so rows can be grouped and
/// sorted on their metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MetaValue {
    Missing,
    Number(f64),
    Text(String),
}

impl MetaValue {
    pub fn parse(raw: &str) -> Self {
        if is_missing_token(raw) {
            return MetaValue::Missing;
        }
        let raw = raw.trim();
        match raw.parse::<f64>() {
            Ok(v) => MetaValue::Number(v),
            Err(_) => MetaValue::Text(raw.to_string()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            MetaValue::Missing => 0,
            MetaValue::Number(_) => 1,
            MetaValue::Text(_) => 2,
        }
    }
}

impl PartialEq for MetaValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MetaValue {}

impl PartialOrd for MetaValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetaValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (MetaValue::Number(a), MetaValue::Number(b)) => a.total_cmp(b),
            (MetaValue::Text(a), MetaValue::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for MetaValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            MetaValue::Missing => {}
            MetaValue::Number(v) => v.to_bits().hash(state),
            MetaValue::Text(s) => s.hash(state),
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Missing => write!(f, "--"),
            MetaValue::Number(v) => match f.precision() {
                Some(p) => write!(f, "{:.*}", p, v),
                None => write!(f, "{}", v),
            },
            MetaValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Names of the non-feature columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSchema {
    pub group_column: String,
    pub label_column: String,
    /// Extra metadata columns, in output order.
    pub fields: Vec<String>,
}

impl Default for MetadataSchema {
    fn default() -> Self {
        Self {
            group_column: "filename".to_string(),
            label_column: "type".to_string(),
            fields: Vec::new(),
        }
    }
}

impl MetadataSchema {
    pub fn with_fields(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            ..Self::default()
        }
    }

    /// All metadata column names: group, label, then fields.
    pub fn column_names(&self) -> Vec<&str> {
        let mut names = vec![self.group_column.as_str(), self.label_column.as_str()];
        names.extend(self.fields.iter().map(String::as_str));
        names
    }
}

/// Immutable metadata of one row. Ordering follows (group, label, fields).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowMetadata {
    pub group: String,
    pub label: Option<String>,
    pub fields: Vec<MetaValue>,
}

impl RowMetadata {
    pub fn new(group: impl Into<String>, label: Option<&str>, fields: Vec<MetaValue>) -> Self {
        Self {
            group: group.into(),
            label: label.map(str::to_string),
            fields,
        }
    }
}

/// One feature vector and its metadata.
#[derive(Debug, Clone)]
pub struct Sample {
    pub features: Vec<f64>,
    pub metadata: RowMetadata,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub x: Array2<f64>,
    pub metadata: Vec<RowMetadata>,
    pub feature_names: Vec<String>,
    pub schema: MetadataSchema,
}

impl Dataset {
    pub fn new(
        x: Array2<f64>,
        metadata: Vec<RowMetadata>,
        feature_names: Vec<String>,
        schema: MetadataSchema,
    ) -> Result<Self> {
        if x.nrows() != metadata.len() {
            return Err(ClassifierError::Data(format!(
                "{} feature rows but {} metadata rows",
                x.nrows(),
                metadata.len()
            )));
        }
        if x.ncols() != feature_names.len() {
            return Err(ClassifierError::Data(format!(
                "{} feature columns but {} feature names",
                x.ncols(),
                feature_names.len()
            )));
        }
        if let Some(row) = metadata
            .iter()
            .position(|m| m.fields.len() != schema.fields.len())
        {
            return Err(ClassifierError::Data(format!(
                "row {} has {} metadata fields, expected {}",
                row,
                metadata[row].fields.len(),
                schema.fields.len()
            )));
        }
        Ok(Self {
            x,
            metadata,
            feature_names,
            schema,
        })
    }

    /// Build from samples, checking every feature vector has the same length.
    pub fn from_samples(
        samples: Vec<Sample>,
        feature_names: Vec<String>,
        schema: MetadataSchema,
    ) -> Result<Self> {
        let d = feature_names.len();
        let mut data = Vec::with_capacity(samples.len() * d);
        let mut metadata = Vec::with_capacity(samples.len());
        for (i, sample) in samples.into_iter().enumerate() {
            if sample.features.len() != d {
                return Err(ClassifierError::Data(format!(
                    "sample {} has {} features, expected {}",
                    i,
                    sample.features.len(),
                    d
                )));
            }
            data.extend(sample.features);
            metadata.push(sample.metadata);
        }
        let x = Array2::from_shape_vec((metadata.len(), d), data)?;
        Self::new(x, metadata, feature_names, schema)
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn labels(&self) -> Vec<Option<&str>> {
        self.metadata.iter().map(|m| m.label.as_deref()).collect()
    }

    pub fn has_all_labels(&self) -> bool {
        self.metadata.iter().all(|m| m.label.is_some())
    }

    /// Every row's label, or an error naming how many rows lack one.
    pub fn require_labels(&self) -> Result<Vec<String>> {
        let missing = self.metadata.iter().filter(|m| m.label.is_none()).count();
        if missing > 0 {
            return Err(ClassifierError::MissingLabels {
                column: self.schema.label_column.clone(),
                count: missing,
            });
        }
        Ok(self
            .metadata
            .iter()
            .filter_map(|m| m.label.clone())
            .collect())
    }

    /// Distinct group keys in order of first appearance.
    pub fn unique_groups(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut groups = Vec::new();
        for m in &self.metadata {
            if seen.insert(m.group.as_str()) {
                groups.push(m.group.clone());
            }
        }
        groups
    }

    /// Row indices per group key.
    pub fn rows_by_group(&self) -> HashMap<&str, Vec<usize>> {
        let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, m) in self.metadata.iter().enumerate() {
            groups.entry(m.group.as_str()).or_default().push(i);
        }
        groups
    }

    /// Number of rows per object when every group has the same count.
    pub fn draws_per_object(&self) -> Option<usize> {
        let groups = self.rows_by_group();
        let mut counts = groups.values().map(Vec::len);
        let first = counts.next()?;
        counts.all(|c| c == first).then_some(first)
    }

    pub fn select_rows(&self, indices: &[usize]) -> Dataset {
        Dataset {
            x: self.x.select_rows(indices),
            metadata: indices.iter().map(|&i| self.metadata[i].clone()).collect(),
            feature_names: self.feature_names.clone(),
            schema: self.schema.clone(),
        }
    }

    pub fn filter(&self, mask: &[bool]) -> Dataset {
        let indices: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();
        self.select_rows(&indices)
    }

    pub fn class_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for label in self.metadata.iter().filter_map(|m| m.label.as_ref()) {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn log_input_data_summary(&self) {
        info!("----- Input Data Summary -----");
        info!(
            "{} rows from {} objects, {} features",
            self.len(),
            self.unique_groups().len(),
            self.n_features()
        );
        match self.draws_per_object() {
            Some(n) => info!("{} draws per object", n),
            None => info!("Objects have differing numbers of draws"),
        }
        for (class, n) in self.class_counts() {
            info!("  {}: {} rows", class, n);
        }
        let unlabelled = self.metadata.iter().filter(|m| m.label.is_none()).count();
        if unlabelled > 0 {
            info!("  (unlabelled): {} rows", unlabelled);
        }
        info!("-------------------------------");
    }
}

/// Metadata plus a probability vector over the table's classes.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityRow {
    pub metadata: RowMetadata,
    pub probabilities: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityTable {
    /// Class order of every probability vector.
    pub classes: Vec<String>,
    pub schema: MetadataSchema,
    pub rows: Vec<ProbabilityRow>,
}

impl ProbabilityTable {
    pub fn new(
        classes: Vec<String>,
        schema: MetadataSchema,
        rows: Vec<ProbabilityRow>,
    ) -> Result<Self> {
        if let Some(i) = rows
            .iter()
            .position(|r| r.probabilities.len() != classes.len())
        {
            return Err(ClassifierError::Data(format!(
                "row {} has {} probabilities for {} classes",
                i,
                rows[i].probabilities.len(),
                classes.len()
            )));
        }
        Ok(Self {
            classes,
            schema,
            rows,
        })
    }

    /// Pair each dataset row's metadata with the matching row of `proba`.
    pub fn from_predictions(
        dataset: &Dataset,
        classes: &[String],
        proba: &Array2<f64>,
    ) -> Result<Self> {
        if proba.nrows() != dataset.len() || proba.ncols() != classes.len() {
            return Err(ClassifierError::Data(format!(
                "probability matrix is {}x{}, expected {}x{}",
                proba.nrows(),
                proba.ncols(),
                dataset.len(),
                classes.len()
            )));
        }
        let rows = dataset
            .metadata
            .iter()
            .zip(proba.rows())
            .map(|(metadata, p)| ProbabilityRow {
                metadata: metadata.clone(),
                probabilities: p.to_vec(),
            })
            .collect();
        Ok(Self {
            classes: classes.to_vec(),
            schema: dataset.schema.clone(),
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn class_index(&self, class: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == class)
    }

    /// Probability column of one class.
    pub fn column(&self, class: &str) -> Result<Vec<f64>> {
        let idx = self.class_index(class).ok_or_else(|| {
            ClassifierError::Data(format!("no probability column for class '{}'", class))
        })?;
        Ok(self.rows.iter().map(|r| r.probabilities[idx]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(group: &str, label: Option<&str>, features: Vec<f64>) -> Sample {
        Sample {
            features,
            metadata: RowMetadata::new(group, label, vec![MetaValue::Number(0.1)]),
        }
    }

    fn schema() -> MetadataSchema {
        MetadataSchema::with_fields(&["redshift"])
    }

    #[test]
    fn rejects_ragged_feature_vectors() {
        let samples = vec![
            sample("a", Some("SNIa"), vec![1.0, 2.0]),
            sample("b", Some("SNII"), vec![1.0]),
        ];
        let err = Dataset::from_samples(samples, vec!["f1".into(), "f2".into()], schema());
        assert!(matches!(err, Err(ClassifierError::Data(_))));
    }

    #[test]
    fn groups_and_labels() {
        let samples = vec![
            sample("b", Some("SNIa"), vec![1.0]),
            sample("a", None, vec![2.0]),
            sample("b", Some("SNIa"), vec![3.0]),
            sample("a", None, vec![4.0]),
        ];
        let ds = Dataset::from_samples(samples, vec!["f".into()], schema()).unwrap();
        assert_eq!(ds.unique_groups(), vec!["b", "a"]);
        assert_eq!(ds.draws_per_object(), Some(2));
        match ds.require_labels() {
            Err(ClassifierError::MissingLabels { column, count }) => {
                assert_eq!(column, "type");
                assert_eq!(count, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        let labelled = ds.filter(&[true, false, true, false]);
        assert_eq!(labelled.require_labels().unwrap(), vec!["SNIa", "SNIa"]);
        assert_eq!(labelled.x.as_slice(), &[1.0, 3.0]);
    }

    #[test]
    fn meta_values_parse_and_order() {
        assert_eq!(MetaValue::parse("--"), MetaValue::Missing);
        assert_eq!(MetaValue::parse(" 0.25 "), MetaValue::Number(0.25));
        assert_eq!(MetaValue::parse("host"), MetaValue::Text("host".into()));
        assert!(MetaValue::Missing < MetaValue::Number(-1.0));
        assert!(MetaValue::Number(0.1) < MetaValue::Number(0.2));
        assert_eq!(format!("{:.4}", MetaValue::Number(0.1)), "0.1000");
    }
}
