//! Content saliency: choosing the most relevant piece of content among several candidates.

use std::cmp::Reverse;

use itertools::Itertools;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::{Value, VariableStorage};

/// Prefix of the view counters kept for each piece of salient content.
pub const VIEW_COUNT_PREFIX: &str = "$Yarn.Internal.Content.ViewCount.";

/// The kind of content a saliency candidate stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum ContentKind {
    /// A node in a node group.
    Node,
    /// A line in a line group.
    Line,
}

/// A candidate piece of content recorded while a node runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSaliencyOption {
    /// The content id. Never empty.
    pub content_id: String,
    /// The number of the candidate's conditions that passed.
    pub passing_condition_count: usize,
    /// The number of the candidate's conditions that failed.
    pub failing_condition_count: usize,
    /// The complexity of the candidate's conditions.
    pub complexity_score: i32,
    /// What the candidate stands for.
    pub content_kind: ContentKind,
    /// The instruction to continue at when the candidate is chosen.
    pub destination: usize,
}

impl ContentSaliencyOption {
    /// The storage key holding how often this content has been selected.
    #[must_use]
    pub fn view_count_key(&self) -> String {
        format!("{VIEW_COUNT_PREFIX}{}", self.content_id)
    }

    /// Whether every condition of this candidate passed.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.failing_condition_count == 0
    }

    fn view_count(&self, storage: &VariableStorage) -> u64 {
        storage.number(&self.view_count_key()).map_or(0, |n| n.max(0.0) as u64)
    }
}

/// A policy for choosing among saliency candidates.
///
/// Queries are pure. Bookkeeping belongs in [`SaliencyStrategy::content_was_selected`], which the
/// executor calls once per selection with the candidate the query returned.
pub trait SaliencyStrategy {
    /// Pick the best candidate, or none if no candidate is eligible.
    fn query_best_content<'c>(
        &self,
        candidates: &'c [ContentSaliencyOption],
        storage: &VariableStorage,
    ) -> Option<&'c ContentSaliencyOption>;

    /// Record that `content` was selected.
    fn content_was_selected(
        &mut self,
        _content: &ContentSaliencyOption,
        _storage: &mut VariableStorage,
    ) {
    }
}

/// A strategy, wrapped in a smart pointer.
pub type BoxedSaliencyStrategy = Box<dyn SaliencyStrategy + Send + Sync>;

/// Picks the first eligible candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstSaliencyStrategy;

impl SaliencyStrategy for FirstSaliencyStrategy {
    fn query_best_content<'c>(
        &self,
        candidates: &'c [ContentSaliencyOption],
        _: &VariableStorage,
    ) -> Option<&'c ContentSaliencyOption> {
        candidates.iter().find(|c| c.is_eligible())
    }
}

/// Picks the eligible candidate with the highest complexity, the earliest on ties.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestSaliencyStrategy;

impl SaliencyStrategy for BestSaliencyStrategy {
    fn query_best_content<'c>(
        &self,
        candidates: &'c [ContentSaliencyOption],
        _: &VariableStorage,
    ) -> Option<&'c ContentSaliencyOption> {
        // `min_by_key` keeps the first of equal elements.
        candidates.iter().filter(|c| c.is_eligible()).min_by_key(|c| Reverse(c.complexity_score))
    }
}

/// Picks among the least viewed eligible candidates the one with the highest complexity, and
/// counts a view each time content is selected.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestLeastRecentlyViewedSaliencyStrategy {
    /// Break remaining ties uniformly at random instead of taking the earliest candidate.
    pub random_tiebreak: bool,
}

impl BestLeastRecentlyViewedSaliencyStrategy {
    /// Create a new strategy.
    #[must_use]
    pub fn new(random_tiebreak: bool) -> Self {
        Self { random_tiebreak }
    }
}

impl SaliencyStrategy for BestLeastRecentlyViewedSaliencyStrategy {
    fn query_best_content<'c>(
        &self,
        candidates: &'c [ContentSaliencyOption],
        storage: &VariableStorage,
    ) -> Option<&'c ContentSaliencyOption> {
        let least_viewed = candidates
            .iter()
            .filter(|c| c.is_eligible())
            .min_set_by_key(|c| c.view_count(storage));
        let best = least_viewed.into_iter().max_set_by_key(|c| c.complexity_score);

        if self.random_tiebreak {
            best.choose(&mut rand::thread_rng()).copied()
        } else {
            best.first().copied()
        }
    }

    fn content_was_selected(
        &mut self,
        content: &ContentSaliencyOption,
        storage: &mut VariableStorage,
    ) {
        let views = content.view_count(storage);
        storage.set(content.view_count_key(), Value::Number((views + 1) as f64));
    }
}

/// The saliency strategies available by name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum SaliencyStrategyKind {
    /// [`FirstSaliencyStrategy`].
    #[default]
    First,
    /// [`BestSaliencyStrategy`].
    Best,
    /// [`BestLeastRecentlyViewedSaliencyStrategy`], breaking ties by order.
    BestLeastRecentlyViewed,
    /// [`BestLeastRecentlyViewedSaliencyStrategy`], breaking ties at random.
    RandomBestLeastRecentlyViewed,
}

impl SaliencyStrategyKind {
    /// Instantiate the strategy.
    #[must_use]
    pub fn build(self) -> BoxedSaliencyStrategy {
        match self {
            SaliencyStrategyKind::First => Box::new(FirstSaliencyStrategy),
            SaliencyStrategyKind::Best => Box::new(BestSaliencyStrategy),
            SaliencyStrategyKind::BestLeastRecentlyViewed => {
                Box::new(BestLeastRecentlyViewedSaliencyStrategy::new(false))
            }
            SaliencyStrategyKind::RandomBestLeastRecentlyViewed => {
                Box::new(BestLeastRecentlyViewedSaliencyStrategy::new(true))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, complexity: i32, failing: usize) -> ContentSaliencyOption {
        ContentSaliencyOption {
            content_id: id.to_string(),
            passing_condition_count: 1,
            failing_condition_count: failing,
            complexity_score: complexity,
            content_kind: ContentKind::Line,
            destination: 0,
        }
    }

    fn ids(picked: Option<&ContentSaliencyOption>) -> Option<&str> {
        picked.map(|c| c.content_id.as_str())
    }

    #[test]
    fn first_skips_failed_candidates() {
        let storage = VariableStorage::new();
        let candidates = [candidate("a", 5, 1), candidate("b", 0, 0), candidate("c", 9, 0)];
        assert_eq!(ids(FirstSaliencyStrategy.query_best_content(&candidates, &storage)), Some("b"));
        assert_eq!(
            FirstSaliencyStrategy.query_best_content(&candidates[..1], &storage),
            None
        );
    }

    #[test]
    fn best_prefers_complexity_then_order() {
        let storage = VariableStorage::new();
        let candidates = [
            candidate("a", 1, 0),
            candidate("b", 3, 0),
            candidate("c", 3, 0),
            candidate("d", 7, 2),
        ];
        assert_eq!(ids(BestSaliencyStrategy.query_best_content(&candidates, &storage)), Some("b"));
    }

    #[test]
    fn least_recently_viewed_rotates_through_candidates() {
        let mut storage = VariableStorage::new();
        let mut strategy = BestLeastRecentlyViewedSaliencyStrategy::new(false);
        let candidates = [candidate("a", 1, 0), candidate("b", 1, 0), candidate("c", 2, 0)];

        let mut picks = Vec::new();
        for _ in 0..3 {
            let picked = strategy.query_best_content(&candidates, &storage).unwrap().clone();
            strategy.content_was_selected(&picked, &mut storage);
            picks.push(picked.content_id);
        }

        assert_eq!(picks, ["c", "a", "b"]);
        assert_eq!(storage.number("$Yarn.Internal.Content.ViewCount.c"), Some(1.0));
    }

    #[test]
    fn random_tiebreak_stays_within_best_group() {
        let storage = VariableStorage::new();
        let strategy = BestLeastRecentlyViewedSaliencyStrategy::new(true);
        let candidates = [candidate("a", 2, 0), candidate("b", 2, 0), candidate("c", 1, 0)];
        for _ in 0..50 {
            let picked = ids(strategy.query_best_content(&candidates, &storage));
            assert!(matches!(picked, Some("a" | "b")));
        }
    }

    #[test]
    fn no_eligible_candidates() {
        let storage = VariableStorage::new();
        let candidates = [candidate("a", 2, 1)];
        for kind in [
            SaliencyStrategyKind::First,
            SaliencyStrategyKind::Best,
            SaliencyStrategyKind::BestLeastRecentlyViewed,
        ] {
            assert!(kind.build().query_best_content(&candidates, &storage).is_none());
        }
    }
}
