//! One combine run: discover, merge, derive, resolve, order, write, publish.

use crate::basin::{derive_basins, normalize_reaches, SwordNames, SwordProbeLike};
use crate::config::CombineConfig;
use crate::continent::{load_continents, ContinentCode, REACHES_DATASET};
use crate::dataset::{Accumulator, GlobalDataset, BASIN_DATASET};
use crate::merger::{merge_fragments, MergeMode};
use crate::upload::{upload_outputs, ObjectStoreLike};
use crate::writer::{delete_fragments, write_datasets};
use crate::CombineError;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub continents: Vec<ContinentCode>,
    pub manifest_path: PathBuf,
    pub written: Vec<PathBuf>,
    pub uploaded: usize,
    pub deleted: usize,
}

/// Expand bare reach ids and build the `basin` dataset from the fully merged
/// `reaches` dataset. Without merged reaches the accumulator passes through.
pub fn derive_stage(
    mut acc: Accumulator,
    sword_version: &str,
    probe: &dyn SwordProbeLike,
) -> Result<Accumulator, CombineError> {
    let Some(reaches) = acc.take_sequence(REACHES_DATASET) else {
        info!("no merged reaches, basin derivation skipped");
        return Ok(acc);
    };

    let mut names = SwordNames::new(sword_version, probe);
    let reaches = normalize_reaches(reaches, &mut names)?;
    let basins = derive_basins(&reaches, &mut names)?;
    acc.replace_sequence(REACHES_DATASET, reaches);

    let basins = basins
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    acc.insert_derived(BASIN_DATASET, GlobalDataset::Sequence(basins));
    Ok(acc)
}

pub fn run(
    config: &CombineConfig,
    probe: &dyn SwordProbeLike,
    store: Option<&dyn ObjectStoreLike>,
) -> Result<RunReport, CombineError> {
    let start = Instant::now();
    let discovery = load_continents(&config.data_dir, &config.cont_file, config.expanded)?;
    info!(continents = ?discovery.continents, "Continents present");

    let mode = if config.expanded {
        MergeMode::Expanded
    } else {
        MergeMode::Full
    };
    let mut acc = merge_fragments(&config.data_dir, &discovery.continents, mode)?;
    if mode == MergeMode::Full {
        acc = derive_stage(acc, &config.sword_version, probe)?;
    }
    let acc = acc.resolve_listings().order_keys();
    acc.log_totals();

    let written = write_datasets(&config.data_dir, &acc)?;

    let mut uploaded = 0;
    if let Some(target) = &config.upload {
        let store = store.ok_or_else(|| {
            CombineError::Config(format!("upload to {} requested without an object store", target.bucket))
        })?;
        let mut files = written.clone();
        files.push(discovery.manifest_path.clone());
        upload_outputs(store, &files, target.prefix.as_deref())?;
        uploaded = files.len();
        info!(bucket = %target.bucket, files = uploaded, "Upload complete");
    }

    let mut deleted = 0;
    if config.delete {
        delete_fragments(acc.merged_fragments())?;
        deleted = acc.merged_fragments().len();
    }

    info!(elapsed = ?start.elapsed(), "Execution time");
    Ok(RunReport {
        continents: discovery.continents,
        manifest_path: discovery.manifest_path,
        written,
        uploaded,
        deleted,
    })
}
