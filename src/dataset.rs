//! Dataset kinds and the in-memory accumulator that carries merged global
//! datasets from one stage to the next.

use crate::listing;
use crate::natural_sort::sort_mapping;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const BASIN_DATASET: &str = "basin";
pub const EXPANDED_REACHES_DATASET: &str = "expanded_reaches_of_interest";

/// How fragments of a dataset combine, decided once from the dataset name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    /// JSON array, fragments concatenated.
    Sequence,
    /// JSON object keyed by cycle/pass, unioned and written in natural order.
    Mapping,
    /// JSON array of object-store keys, resolved for reprocessing duplicates.
    Listing,
    /// JSON object of reach id to listing array, each list resolved.
    ListingMapping,
    /// Produced by derivation; fragments of this name are ignored.
    DerivedOnly,
}

impl DatasetKind {
    pub fn for_name(name: &str) -> Self {
        match name {
            "cycle_passes" | "passes" => DatasetKind::Mapping,
            "s3_list" => DatasetKind::Listing,
            "s3_reach" => DatasetKind::ListingMapping,
            BASIN_DATASET => DatasetKind::DerivedOnly,
            _ => DatasetKind::Sequence,
        }
    }

    fn empty(&self) -> GlobalDataset {
        match self {
            DatasetKind::Mapping | DatasetKind::ListingMapping => GlobalDataset::Mapping(Map::new()),
            _ => GlobalDataset::Sequence(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlobalDataset {
    Sequence(Vec<Value>),
    Mapping(Map<String, Value>),
}

impl GlobalDataset {
    pub fn len(&self) -> usize {
        match self {
            GlobalDataset::Sequence(v) => v.len(),
            GlobalDataset::Mapping(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_value(&self) -> Value {
        match self {
            GlobalDataset::Sequence(v) => Value::Array(v.clone()),
            GlobalDataset::Mapping(m) => Value::Object(m.clone()),
        }
    }
}

/// A fragment whose JSON shape does not match its dataset kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeMismatch {
    pub dataset: String,
    pub expected: &'static str,
}

impl fmt::Display for ShapeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fragment for {} is not a JSON {}", self.dataset, self.expected)
    }
}

impl std::error::Error for ShapeMismatch {}

#[derive(Debug, Clone)]
pub struct Entry {
    pub kind: DatasetKind,
    pub data: GlobalDataset,
}

/// Global datasets for one run, keyed by dataset name. Each stage takes the
/// accumulator by value and hands it on.
#[derive(Debug, Default)]
pub struct Accumulator {
    datasets: BTreeMap<String, Entry>,
    merged_fragments: Vec<PathBuf>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&GlobalDataset> {
        self.datasets.get(name).map(|e| &e.data)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GlobalDataset)> {
        self.datasets.iter().map(|(k, e)| (k.as_str(), &e.data))
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Fragment files that contributed to this accumulator.
    pub fn merged_fragments(&self) -> &[PathBuf] {
        &self.merged_fragments
    }

    /// Fold one parsed fragment into the dataset `name`. Returns `Ok(false)`
    /// when the dataset is derived-only and the fragment was ignored.
    pub fn absorb(
        &mut self,
        name: &str,
        fragment: Value,
        source: PathBuf,
    ) -> Result<bool, ShapeMismatch> {
        let kind = DatasetKind::for_name(name);
        if kind == DatasetKind::DerivedOnly {
            debug!(dataset = name, path = %source.display(), "ignoring fragment of derived dataset");
            return Ok(false);
        }

        let mismatch = |expected: &'static str| ShapeMismatch {
            dataset: name.to_string(),
            expected,
        };
        // Validate before touching the accumulator so a bad fragment leaves no trace.
        match (&kind, &fragment) {
            (DatasetKind::Sequence | DatasetKind::Listing, Value::Array(_)) => {}
            (DatasetKind::Sequence | DatasetKind::Listing, _) => return Err(mismatch("array")),
            (DatasetKind::Mapping | DatasetKind::ListingMapping, Value::Object(_)) => {}
            _ => return Err(mismatch("object")),
        }

        let entry = self
            .datasets
            .entry(name.to_string())
            .or_insert_with(|| Entry {
                kind,
                data: kind.empty(),
            });

        match (&mut entry.data, fragment) {
            (GlobalDataset::Sequence(all), Value::Array(items)) => all.extend(items),
            (GlobalDataset::Mapping(all), Value::Object(items)) => {
                for (key, value) in items {
                    if kind == DatasetKind::ListingMapping {
                        merge_listing_value(all, key, value, name, &source);
                    } else if all.insert(key.clone(), value).is_some() {
                        warn!(dataset = name, key = %key, path = %source.display(), "key collision across continents, later value kept");
                    }
                }
            }
            _ => return Err(mismatch("value of the accumulated shape")),
        }

        self.merged_fragments.push(source);
        Ok(true)
    }

    /// Install a dataset produced by a derivation stage, replacing any
    /// previous value.
    pub fn insert_derived(&mut self, name: &str, data: GlobalDataset) {
        self.datasets.insert(
            name.to_string(),
            Entry {
                kind: DatasetKind::DerivedOnly,
                data,
            },
        );
    }

    pub fn replace_sequence(&mut self, name: &str, items: Vec<Value>) {
        if let Some(entry) = self.datasets.get_mut(name) {
            entry.data = GlobalDataset::Sequence(items);
        }
    }

    pub fn take_sequence(&mut self, name: &str) -> Option<Vec<Value>> {
        match self.datasets.get_mut(name).map(|e| &mut e.data) {
            Some(GlobalDataset::Sequence(items)) => Some(std::mem::take(items)),
            _ => None,
        }
    }

    /// Collapse reprocessing duplicates in every listing dataset.
    pub fn resolve_listings(mut self) -> Self {
        for (name, entry) in self.datasets.iter_mut() {
            match (entry.kind, &mut entry.data) {
                (DatasetKind::Listing, GlobalDataset::Sequence(items)) => {
                    let before = items.len();
                    *items = resolve_value_list(name, std::mem::take(items));
                    info!(dataset = %name, before, after = items.len(), "Resolved listing duplicates");
                }
                (DatasetKind::ListingMapping, GlobalDataset::Mapping(map)) => {
                    for (key, value) in map.iter_mut() {
                        let items = match value.take() {
                            Value::Array(items) => items,
                            _ => {
                                warn!(dataset = %name, key = %key, "listing value is not an array, clearing");
                                Vec::new()
                            }
                        };
                        *value = Value::Array(resolve_value_list(name, items));
                    }
                }
                _ => {}
            }
        }
        self
    }

    /// Put every keyed dataset into natural key order.
    pub fn order_keys(mut self) -> Self {
        for entry in self.datasets.values_mut() {
            if let GlobalDataset::Mapping(map) = &mut entry.data {
                *map = sort_mapping(std::mem::take(map));
            }
        }
        self
    }

    pub fn log_totals(&self) {
        for (name, data) in self.iter() {
            info!(dataset = name, count = data.len(), "Number of objects in {}: {}", name, data.len());
        }
    }
}

fn merge_listing_value(
    all: &mut Map<String, Value>,
    key: String,
    value: Value,
    dataset: &str,
    source: &Path,
) {
    match (all.get_mut(&key), value) {
        (Some(Value::Array(existing)), Value::Array(more)) => existing.extend(more),
        (Some(Value::Array(_)), other) => {
            warn!(dataset, key = %key, value = %other, path = %source.display(), "listing value is not an array, earlier listing kept");
        }
        (Some(_), value) => {
            warn!(dataset, key = %key, path = %source.display(), "key collision across continents, later value kept");
            all.insert(key, value);
        }
        (None, value) => {
            all.insert(key, value);
        }
    }
}

fn resolve_value_list(dataset: &str, items: Vec<Value>) -> Vec<Value> {
    let entries = items
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            other => {
                warn!(dataset, entry = %other, "listing entry is not a string, dropping");
                None
            }
        })
        .collect::<Vec<_>>();
    listing::resolve(&entries)
        .into_iter()
        .map(Value::String)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn src(name: &str) -> PathBuf {
        PathBuf::from(name)
    }

    #[test]
    fn test_kinds_resolved_from_name() {
        assert_eq!(DatasetKind::for_name("cycle_passes"), DatasetKind::Mapping);
        assert_eq!(DatasetKind::for_name("passes"), DatasetKind::Mapping);
        assert_eq!(DatasetKind::for_name("s3_list"), DatasetKind::Listing);
        assert_eq!(DatasetKind::for_name("s3_reach"), DatasetKind::ListingMapping);
        assert_eq!(DatasetKind::for_name("basin"), DatasetKind::DerivedOnly);
        assert_eq!(DatasetKind::for_name("metrosets"), DatasetKind::Sequence);
    }

    #[test]
    fn test_sequences_concatenate_without_dedup() {
        let mut acc = Accumulator::new();
        acc.absorb("sicsets", json!([1, 2, 3]), src("sicsets_af.json")).unwrap();
        acc.absorb("sicsets", json!([3, 4]), src("sicsets_eu.json")).unwrap();
        assert_eq!(acc.get("sicsets").unwrap().len(), 5);
        assert_eq!(acc.merged_fragments().len(), 2);
    }

    #[test]
    fn test_mapping_collision_last_wins() {
        let mut acc = Accumulator::new();
        acc.absorb("passes", json!({"p1": [1], "p2": [2]}), src("passes_af.json")).unwrap();
        acc.absorb("passes", json!({"p2": [9]}), src("passes_eu.json")).unwrap();
        let Some(GlobalDataset::Mapping(map)) = acc.get("passes") else { panic!("not a mapping") };
        assert_eq!(map["p2"], json!([9]));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_shape_mismatch_leaves_no_trace() {
        let mut acc = Accumulator::new();
        let err = acc.absorb("passes", json!([1]), src("passes_af.json")).unwrap_err();
        assert_eq!(err.expected, "object");
        assert!(acc.get("passes").is_none());
        assert!(acc.merged_fragments().is_empty());
    }

    #[test]
    fn test_derived_fragments_ignored() {
        let mut acc = Accumulator::new();
        assert!(!acc.absorb("basin", json!([1]), src("basin_af.json")).unwrap());
        assert!(acc.is_empty());
    }

    #[test]
    fn test_listing_mapping_concatenates_colliding_keys() {
        let mut acc = Accumulator::new();
        acc.absorb("s3_reach", json!({"1": ["a01.zip_x"]}), src("s3_reach_af.json")).unwrap();
        acc.absorb("s3_reach", json!({"1": ["b01.zip_x"]}), src("s3_reach_eu.json")).unwrap();
        let Some(GlobalDataset::Mapping(map)) = acc.get("s3_reach") else { panic!("not a mapping") };
        assert_eq!(map["1"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_listing_mapping_keeps_array_over_scalar() {
        let mut acc = Accumulator::new();
        acc.absorb("s3_reach", json!({"1": ["a"]}), src("s3_reach_af.json")).unwrap();
        acc.absorb("s3_reach", json!({"1": "b"}), src("s3_reach_eu.json")).unwrap();
        let Some(GlobalDataset::Mapping(map)) = acc.get("s3_reach") else { panic!("not a mapping") };
        assert_eq!(map["1"], json!(["a"]));
    }

    #[test]
    fn test_resolve_listings_dedups_across_continents() {
        let name = "SWOT_L2_HR_RiverSP_Reach_010_222_AF_20231101T000000_20231101T000010_PIC0_01.zip";
        let mut acc = Accumulator::new();
        acc.absorb("s3_list", json!([name, 7]), src("s3_list_af.json")).unwrap();
        acc.absorb("s3_list", json!([name]), src("s3_list_eu.json")).unwrap();
        acc.absorb("s3_reach", json!({"12798000121": [name, name]}), src("s3_reach_af.json")).unwrap();

        let acc = acc.resolve_listings();
        assert_eq!(acc.get("s3_list"), Some(&GlobalDataset::Sequence(vec![json!(name)])));
        let Some(GlobalDataset::Mapping(map)) = acc.get("s3_reach") else { panic!("not a mapping") };
        assert_eq!(map["12798000121"], json!([name]));
    }

    #[test]
    fn test_order_keys_natural() {
        let mut acc = Accumulator::new();
        acc.absorb("cycle_passes", json!({"pass10": 1, "pass2": 2, "pass1": 3}), src("cycle_passes_af.json"))
            .unwrap();
        let acc = acc.order_keys();
        let Some(GlobalDataset::Mapping(map)) = acc.get("cycle_passes") else { panic!("not a mapping") };
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["pass1", "pass2", "pass10"]);
    }
}
