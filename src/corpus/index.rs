// Composer -> work -> outcome index with insert-or-overwrite semantics

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::extraction::FileOutcome;

/// Works of one composer keyed by file stem.
pub type WorkMap = BTreeMap<String, FileOutcome>;

/// Nested mapping composer -> work name -> extraction outcome.
///
/// Keys are kept sorted. Inserting an existing (composer, work) pair replaces
/// the previous outcome and hands it back to the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorpusIndex {
    composers: BTreeMap<String, WorkMap>,
}

/// A work name seen twice for the same composer. The entry from `chunk`
/// replaced the earlier one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeAmbiguity {
    pub composer: String,
    pub work: String,
    pub chunk: usize,
}

impl fmt::Display for MergeAmbiguity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "duplicate work '{}' for composer '{}' (kept entry from chunk {})",
            self.work, self.composer, self.chunk
        )
    }
}

/// Final per-composer counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposerTotals {
    pub composer: String,
    pub total: usize,
    pub valid: usize,
    pub errors: usize,
}

impl CorpusIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. Returns the displaced outcome, if any.
    pub fn insert(&mut self, composer: &str, work: &str, outcome: FileOutcome) -> Option<FileOutcome> {
        self.composers
            .entry(composer.to_string())
            .or_default()
            .insert(work.to_string(), outcome)
    }

    pub fn get(&self, composer: &str, work: &str) -> Option<&FileOutcome> {
        self.composers.get(composer).and_then(|works| works.get(work))
    }

    pub fn works(&self, composer: &str) -> Option<&WorkMap> {
        self.composers.get(composer)
    }

    /// Composer labels in sorted order
    pub fn composers(&self) -> impl Iterator<Item = &str> {
        self.composers.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WorkMap)> {
        self.composers.iter().map(|(c, w)| (c.as_str(), w))
    }

    /// Number of works across all composers
    pub fn len(&self) -> usize {
        self.composers.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Union `partial` into this index, composer by composer. Entries from
    /// `partial` win on collision; each collision is returned tagged with `chunk`.
    pub fn merge(&mut self, partial: CorpusIndex, chunk: usize) -> Vec<MergeAmbiguity> {
        let mut ambiguities = Vec::new();

        for (composer, works) in partial.composers {
            let target = self.composers.entry(composer.clone()).or_default();
            for (work, outcome) in works {
                if target.insert(work.clone(), outcome).is_some() {
                    ambiguities.push(MergeAmbiguity {
                        composer: composer.clone(),
                        work,
                        chunk,
                    });
                }
            }
        }

        ambiguities
    }

    /// Total, valid and error file counts per composer, in composer order.
    pub fn totals(&self) -> Vec<ComposerTotals> {
        self.composers
            .iter()
            .map(|(composer, works)| {
                let valid = works.values().filter(|o| o.is_valid()).count();
                ComposerTotals {
                    composer: composer.clone(),
                    total: works.len(),
                    valid,
                    errors: works.len() - valid,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{ErrorRecord, FileFeatures};
    use std::path::PathBuf;

    fn ok() -> FileOutcome {
        FileOutcome::Features(FileFeatures {
            notes: Vec::new(),
            tempos: Vec::new(),
            time_signatures: Vec::new(),
            key_signature: None,
        })
    }

    fn failed(file: &str) -> FileOutcome {
        FileOutcome::Failed(ErrorRecord {
            error: "bad header".into(),
            file: PathBuf::from(file),
        })
    }

    #[test]
    fn test_insert_overwrites_and_returns_previous() {
        let mut index = CorpusIndex::new();
        assert!(index.insert("alkan", "Op1", ok()).is_none());
        let previous = index.insert("alkan", "Op1", failed("alkan/Op1.mid"));
        assert_eq!(previous, Some(ok()));
        assert_eq!(index.len(), 1);
        assert!(!index.get("alkan", "Op1").unwrap().is_valid());
    }

    #[test]
    fn test_merge_disjoint_has_no_ambiguity() {
        let mut a = CorpusIndex::new();
        a.insert("alkan", "Op1", ok());
        let mut b = CorpusIndex::new();
        b.insert("alkan", "Op2", ok());
        b.insert("mozart", "K331", failed("mozart/K331.mid"));

        let mut merged = CorpusIndex::new();
        assert!(merged.merge(a, 0).is_empty());
        assert!(merged.merge(b, 1).is_empty());
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.composers().collect::<Vec<_>>(), vec!["alkan", "mozart"]);
    }

    #[test]
    fn test_merge_collision_last_wins() {
        let mut a = CorpusIndex::new();
        a.insert("alkan", "Op1", ok());
        let mut b = CorpusIndex::new();
        b.insert("alkan", "Op1", failed("alkan/Op1.MID"));

        let mut merged = CorpusIndex::new();
        merged.merge(a, 0);
        let ambiguities = merged.merge(b, 1);

        assert_eq!(
            ambiguities,
            vec![MergeAmbiguity { composer: "alkan".into(), work: "Op1".into(), chunk: 1 }]
        );
        assert!(!merged.get("alkan", "Op1").unwrap().is_valid());
    }

    #[test]
    fn test_totals() {
        let mut index = CorpusIndex::new();
        index.insert("alkan", "Op1", ok());
        index.insert("alkan", "Op2", failed("alkan/Op2.mid"));
        index.insert("handel", "HWV1", ok());

        let totals = index.totals();
        assert_eq!(
            totals[0],
            ComposerTotals { composer: "alkan".into(), total: 2, valid: 1, errors: 1 }
        );
        assert_eq!(totals[1].valid, 1);
        assert_eq!(totals[1].errors, 0);
    }
}
