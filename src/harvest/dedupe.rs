use std::collections::HashSet;
use tracing::debug;

use crate::harvest::traits::HarvestStage;
use crate::model::ItemReference;

/// Merges references from all listing pages into a set keyed by URL.
///
/// Which `source_page` survives for a URL found on several pages is not part
/// of the contract. This implementation keeps the first occurrence and
/// preserves input order for the survivors.
#[derive(Debug, Default, Clone, Copy)]
pub struct Deduplicator;

impl Deduplicator {
    pub fn dedupe(&self, refs: Vec<ItemReference>) -> Vec<ItemReference> {
        let before = refs.len();
        let mut seen = HashSet::with_capacity(before);
        let unique: Vec<ItemReference> = refs
            .into_iter()
            .filter(|r| seen.insert(r.url.clone()))
            .collect();

        debug!(before, after = unique.len(), "Deduplicated references");
        unique
    }
}

impl HarvestStage for Deduplicator {
    type Input = Vec<ItemReference>;
    type Output = Vec<ItemReference>;
    type Error = std::convert::Infallible;

    fn execute(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        Ok(self.dedupe(input))
    }

    fn stage_name(&self) -> &'static str {
        "deduplicator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(url: &str, page: u32) -> ItemReference {
        ItemReference {
            url: url.to_string(),
            source_page: page,
        }
    }

    #[test]
    fn test_urls_are_pairwise_distinct() {
        let input = vec![
            r("a", 1),
            r("b", 1),
            r("a", 2),
            r("c", 2),
            r("b", 3),
            r("a", 3),
        ];
        let n = input.len();

        let out = Deduplicator.dedupe(input);

        assert!(out.len() <= n);
        assert_eq!(out.len(), 3);
        let urls: HashSet<_> = out.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls.len(), out.len());
    }

    #[test]
    fn test_surviving_source_page_is_one_of_the_occurrences() {
        // Only membership is guaranteed; the exact surviving page is not.
        let out = Deduplicator.dedupe(vec![r("dup", 1), r("dup", 2)]);
        assert_eq!(out.len(), 1);
        assert!([1, 2].contains(&out[0].source_page));
    }

    #[test]
    fn test_no_duplicates_is_unchanged() {
        let input = vec![r("a", 1), r("b", 2), r("c", 3)];
        let out = Deduplicator.dedupe(input.clone());
        assert_eq!(out, input);
    }

    #[test]
    fn test_empty_input() {
        assert!(Deduplicator.dedupe(Vec::new()).is_empty());
    }

    #[test]
    fn test_stage_execute() {
        let out = Deduplicator.execute(vec![r("a", 1), r("a", 1)]).unwrap();
        assert_eq!(out.len(), 1);
    }
}
