use crate::dataset::Accumulator;
use crate::CombineError;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Pretty-print `value` to `path`. The file is flushed and closed before
/// returning, so it is complete before any upload reads it.
pub fn write_json_file(path: &Path, value: &Value) -> Result<(), CombineError> {
    let body = serde_json::to_string_pretty(value)?;
    let mut file = fs::File::create(path)?;
    file.write_all(body.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

/// Write every global dataset as `{dataset}.json` under `data_dir`.
pub fn write_datasets(data_dir: &Path, acc: &Accumulator) -> Result<Vec<PathBuf>, CombineError> {
    let mut written = Vec::with_capacity(acc.len());
    for (name, data) in acc.iter() {
        let path = data_dir.join(format!("{}.json", name));
        write_json_file(&path, &data.to_value())?;
        info!(path = %path.display(), count = data.len(), "Written");
        written.push(path);
    }
    Ok(written)
}

pub fn delete_fragments(paths: &[PathBuf]) -> Result<(), CombineError> {
    for path in paths {
        fs::remove_file(path)?;
        info!(path = %path.display(), "Deleted");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::GlobalDataset;
    use serde_json::json;

    #[test]
    fn test_written_files_are_pretty_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let mut acc = Accumulator::new();
        acc.absorb("passes", json!({"p10": 1, "p9": 2}), dir.path().join("passes_af.json"))
            .unwrap();
        acc.insert_derived("basin", GlobalDataset::Sequence(vec![json!({"basin_id": "1279"})]));
        let acc = acc.order_keys();

        let written = write_datasets(dir.path(), &acc).unwrap();
        assert_eq!(
            written,
            vec![dir.path().join("basin.json"), dir.path().join("passes.json")]
        );

        let text = fs::read_to_string(dir.path().join("passes.json")).unwrap();
        assert_eq!(text, "{\n  \"p9\": 2,\n  \"p10\": 1\n}");
    }

    #[test]
    fn test_delete_removes_listed_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("reaches_af.json");
        fs::write(&a, "[]").unwrap();
        delete_fragments(&[a.clone()]).unwrap();
        assert!(!a.exists());
    }
}
