use crate::continent::ContinentCode;
use crate::dataset::{Accumulator, EXPANDED_REACHES_DATASET};
use crate::CombineError;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Every dataset prefix present for a continent.
    Full,
    /// Only the expanded reaches-of-interest set; no basin derivation.
    Expanded,
}

/// `{dataset}_{continent}.json`
pub fn fragment_file_name(dataset: &str, continent: ContinentCode) -> String {
    format!("{}_{}.json", dataset, continent)
}

/// Dataset name and path of every fragment to merge for `continent`, sorted by
/// dataset name.
pub fn fragments_for(
    data_dir: &Path,
    continent: ContinentCode,
    mode: MergeMode,
) -> Result<Vec<(String, PathBuf)>, CombineError> {
    if mode == MergeMode::Expanded {
        let name = fragment_file_name(EXPANDED_REACHES_DATASET, continent);
        return Ok(vec![(EXPANDED_REACHES_DATASET.to_string(), data_dir.join(name))]);
    }

    let suffix = format!("_{}.json", continent);
    let mut found = Vec::new();
    for entry in fs::read_dir(data_dir)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        if let Some(dataset) = file_name.strip_suffix(&suffix) {
            if dataset.is_empty() {
                continue;
            }
            found.push((dataset.to_string(), entry.path()));
        }
    }
    found.sort();
    Ok(found)
}

pub fn load_fragment(path: &Path) -> Result<Value, CombineError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Merge every fragment of every continent into a fresh accumulator.
///
/// A fragment that is missing, unparseable, or of the wrong shape is logged
/// and contributes nothing; the remaining fragments still merge.
pub fn merge_fragments(
    data_dir: &Path,
    continents: &[ContinentCode],
    mode: MergeMode,
) -> Result<Accumulator, CombineError> {
    let mut acc = Accumulator::new();
    let mut ordered = continents.to_vec();
    ordered.sort();
    ordered.dedup();

    for continent in ordered {
        for (dataset, path) in fragments_for(data_dir, continent, mode)? {
            let fragment = match load_fragment(&path) {
                Ok(v) => v,
                Err(e) => {
                    warn!(dataset = %dataset, continent = %continent, path = %path.display(), error = %e, "failed to read fragment, skipping");
                    continue;
                }
            };
            match acc.absorb(&dataset, fragment, path.clone()) {
                Ok(true) => debug!(dataset = %dataset, continent = %continent, "merged fragment"),
                Ok(false) => {}
                Err(e) => warn!(continent = %continent, path = %path.display(), error = %e, "skipping fragment"),
            }
        }
    }

    info!(datasets = acc.len(), fragments = acc.merged_fragments().len(), "Merged continent fragments");
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::GlobalDataset;
    use serde_json::json;

    fn write(dir: &Path, name: &str, value: Value) {
        fs::write(dir.join(name), serde_json::to_string(&value).unwrap()).unwrap();
    }

    #[test]
    fn test_fragments_matched_by_suffix_only() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hivdisets_na.json", json!([]));
        write(dir.path(), "reaches_na.json", json!([]));
        write(dir.path(), "reaches_sa.json", json!([]));
        write(dir.path(), "reaches.json", json!([]));
        write(dir.path(), "_na.json", json!([]));

        let found = fragments_for(dir.path(), ContinentCode::Na, MergeMode::Full).unwrap();
        let names: Vec<_> = found.iter().map(|(d, _)| d.as_str()).collect();
        assert_eq!(names, vec!["hivdisets", "reaches"]);
    }

    #[test]
    fn test_concatenation_law() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "metrosets_af.json", json!([{"a": 1}, {"a": 2}]));
        write(dir.path(), "metrosets_eu.json", json!([{"a": 1}, {"a": 3}, {"a": 4}]));

        let acc = merge_fragments(
            dir.path(),
            &[ContinentCode::Eu, ContinentCode::Af],
            MergeMode::Full,
        )
        .unwrap();
        assert_eq!(acc.get("metrosets").unwrap().len(), 5);
        let Some(GlobalDataset::Sequence(items)) = acc.get("metrosets") else { panic!("not a sequence") };
        assert_eq!(items[0], json!({"a": 1}));
        assert_eq!(items[2], json!({"a": 1}));
    }

    #[test]
    fn test_bad_fragment_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "sicsets_af.json", json!([1]));
        fs::write(dir.path().join("sicsets_eu.json"), "{not json").unwrap();
        write(dir.path(), "passes_eu.json", json!([1, 2]));

        let acc = merge_fragments(
            dir.path(),
            &[ContinentCode::Af, ContinentCode::Eu],
            MergeMode::Full,
        )
        .unwrap();
        assert_eq!(acc.get("sicsets").unwrap().len(), 1);
        assert!(acc.get("passes").is_none());
        assert_eq!(acc.merged_fragments(), &[dir.path().join("sicsets_af.json")]);
    }

    #[test]
    fn test_expanded_mode_reads_single_dataset() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "expanded_reaches_of_interest_oc.json", json!([51111100011u64]));
        write(dir.path(), "reaches_oc.json", json!([51111100011u64, 51111100021u64]));

        let acc = merge_fragments(dir.path(), &[ContinentCode::Oc, ContinentCode::Sa], MergeMode::Expanded).unwrap();
        let names: Vec<_> = acc.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec![EXPANDED_REACHES_DATASET]);
        assert_eq!(acc.get(EXPANDED_REACHES_DATASET).unwrap().len(), 1);
    }
}
