//! JSON persistence of fitted pipelines.
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::info;

use crate::pipeline::Pipeline;

pub fn save_pipeline<P: AsRef<Path>>(pipeline: &Pipeline, path: P) -> Result<()> {
    let file = File::create(&path)
        .with_context(|| format!("Failed to create {}", path.as_ref().display()))?;
    serde_json::to_writer(BufWriter::new(file), pipeline)
        .with_context(|| format!("Failed to serialize pipeline to {}", path.as_ref().display()))?;
    info!("Pipeline saved to {}", path.as_ref().display());
    Ok(())
}

/// Load a pipeline written by [`save_pipeline`]. Only fitted pipelines are
/// accepted.
pub fn load_pipeline<P: AsRef<Path>>(path: P) -> Result<Pipeline> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open pipeline: {}", path.as_ref().display()))?;
    let pipeline: Pipeline = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse pipeline: {}", path.as_ref().display()))?;
    if !pipeline.is_fitted() {
        return Err(anyhow!(
            "Pipeline in {} has not been fitted",
            path.as_ref().display()
        ));
    }
    info!(
        "Loaded pipeline ({} classes) from {}",
        pipeline.classes().len(),
        path.as_ref().display()
    );
    Ok(pipeline)
}
