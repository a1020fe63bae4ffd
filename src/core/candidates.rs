// Candidate pair normalization
// Turns the raw, possibly asymmetric output of a similarity provider into a
// deduplicated, threshold-filtered, deterministically ordered list of pairs.

use crate::core::image_ref::{ImageRef, PairKey};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Similarity threshold used when the caller does not pick one.
pub const DEFAULT_THRESHOLD: f64 = 0.92;

/// Scores for one source image, as a provider may report them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreList {
    Pairs(Vec<(String, f64)>),
    Mapping(IndexMap<String, f64>),
}

impl ScoreList {
    pub fn into_pairs(self) -> Vec<(String, f64)> {
        match self {
            ScoreList::Pairs(pairs) => pairs,
            ScoreList::Mapping(map) => map.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ScoreList::Pairs(pairs) => pairs.is_empty(),
            ScoreList::Mapping(map) => map.is_empty(),
        }
    }
}

impl From<Vec<(String, f64)>> for ScoreList {
    fn from(pairs: Vec<(String, f64)>) -> Self {
        ScoreList::Pairs(pairs)
    }
}

/// `image name -> candidates` exactly as a provider returned it.
pub type RawSimilarityMap = IndexMap<String, ScoreList>;

/// The raw map after every name has been resolved to an [`ImageRef`], one
/// entry per raw key in scan order. Two keys may resolve to the same image.
pub type ResolvedMap = Vec<(ImageRef, Vec<(ImageRef, f64)>)>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityEdge {
    pub first: ImageRef,
    pub second: ImageRef,
    pub score: f64,
}

impl SimilarityEdge {
    pub fn key(&self) -> PairKey {
        PairKey::new(&self.first, &self.second)
    }
}

/// Re-root every name in `raw` against `target_dir`, keeping map and list order.
///
/// Keys that resolve to the same image keep their own positions, so scan order
/// is exactly the provider's.
pub fn resolve_raw_map(raw: RawSimilarityMap, target_dir: &Path) -> ResolvedMap {
    raw.into_iter()
        .map(|(name, scores)| {
            let candidates = scores
                .into_pairs()
                .into_iter()
                .map(|(other, score)| (ImageRef::resolve(target_dir, &other), score))
                .collect();
            (ImageRef::resolve(target_dir, &name), candidates)
        })
        .collect()
}

/// Collapse `map` into one edge per unordered pair with `score >= threshold`.
///
/// The first observation of a pair in scan order wins, orientation and score
/// included. NaN scores and self-pairs are dropped.
pub fn normalize(map: &[(ImageRef, Vec<(ImageRef, f64)>)], threshold: f64) -> Vec<SimilarityEdge> {
    let mut emitted: HashSet<PairKey> = HashSet::new();
    let mut edges = Vec::new();

    for (source, candidates) in map {
        for (other, score) in candidates {
            if score.is_nan() || *score < threshold {
                continue;
            }
            let key = PairKey::new(source, other);
            if key.is_self_pair() || !emitted.insert(key) {
                continue;
            }
            edges.push(SimilarityEdge {
                first: source.clone(),
                second: other.clone(),
                score: *score,
            });
        }
    }

    log::debug!(
        "Normalized {} raw entries into {} candidate pair(s) at threshold {:.3}",
        map.len(),
        edges.len(),
        threshold
    );
    edges
}
