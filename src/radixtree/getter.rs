//! Resolves which radix tree serves a stage.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

use crate::model::StageInfo;
use crate::radixtree::suffix::SuffixRadixTree;
use crate::radixtree::RadixTree;

pub trait RadixTreeGetter: Send + Sync {
    /// Tree holding the certificates of `stage`.
    fn get(&self, stage: &StageInfo) -> Arc<dyn RadixTree>;

    /// Drop state kept for stages not listed in `existing`.
    fn remove_not_exist_stage(&self, existing: &[StageInfo]);
}

/// One tree shared by every stage.
#[derive(Debug, Default)]
pub struct SingleRadixTreeGetter {
    tree: Arc<SuffixRadixTree>,
}

impl SingleRadixTreeGetter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RadixTreeGetter for SingleRadixTreeGetter {
    fn get(&self, _stage: &StageInfo) -> Arc<dyn RadixTree> {
        self.tree.clone()
    }

    fn remove_not_exist_stage(&self, _existing: &[StageInfo]) {}
}

/// One tree per `"gateway/stage"`, created on first use.
#[derive(Debug, Default)]
pub struct PerStageRadixTreeGetter {
    trees: DashMap<String, Arc<SuffixRadixTree>>,
}

impl PerStageRadixTreeGetter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

impl RadixTreeGetter for PerStageRadixTreeGetter {
    fn get(&self, stage: &StageInfo) -> Arc<dyn RadixTree> {
        self.trees
            .entry(stage.key())
            .or_insert_with(|| Arc::new(SuffixRadixTree::new()))
            .clone()
    }

    fn remove_not_exist_stage(&self, existing: &[StageInfo]) {
        let keep: HashSet<String> = existing.iter().map(StageInfo::key).collect();
        let before = self.trees.len();
        self.trees.retain(|key, _| keep.contains(key));
        let pruned = before.saturating_sub(self.trees.len());
        if pruned > 0 {
            tracing::info!(pruned, "Pruned radix trees of deleted stages");
        }
    }
}

/// Getter selected by the `tls.per_stage_tree` setting.
pub fn new_getter(per_stage: bool) -> Arc<dyn RadixTreeGetter> {
    if per_stage {
        Arc::new(PerStageRadixTreeGetter::new())
    } else {
        Arc::new(SingleRadixTreeGetter::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceKey;
    use crate::radixtree::TlsCert;

    fn pinned(sni: &str) -> TlsCert {
        TlsCert::new("cert", "key").with_pinned_snis(vec![sni.to_string()])
    }

    #[test]
    fn test_single_getter_shares_tree() {
        let getter = SingleRadixTreeGetter::new();
        let prod = StageInfo::new("gw", "prod");
        let test = StageInfo::new("gw", "test");

        getter
            .get(&prod)
            .insert(&ResourceKey::new(prod.clone(), "c1"), pinned("a.com"))
            .unwrap();
        assert!(getter.get(&test).match_longest_prefix("a.com").is_some());
    }

    #[test]
    fn test_per_stage_getter_isolates_and_prunes() {
        let getter = PerStageRadixTreeGetter::new();
        let prod = StageInfo::new("gw", "prod");
        let test = StageInfo::new("gw", "test");

        getter
            .get(&prod)
            .insert(&ResourceKey::new(prod.clone(), "c1"), pinned("a.com"))
            .unwrap();
        assert!(getter.get(&prod).match_longest_prefix("a.com").is_some());
        assert!(getter.get(&test).match_longest_prefix("a.com").is_none());
        assert_eq!(getter.len(), 2);

        // Publish id is payload; the same stage resolves to the same tree
        let republished = prod.clone().with_publish_id(7);
        assert!(getter.get(&republished).match_longest_prefix("a.com").is_some());

        getter.remove_not_exist_stage(&[test.clone()]);
        assert_eq!(getter.len(), 1);
        assert!(getter.get(&prod).match_longest_prefix("a.com").is_none());
    }
}
