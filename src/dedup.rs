//! Title-fingerprint deduplication.
//!
//! Items are first grouped by exact fingerprint (see [`crate::model::normalize_title`]).
//! When the similarity threshold is below 1.0, a new fingerprint also joins an
//! existing group if its normalized title is within that normalized
//! Levenshtein similarity of the group's first title. Each group keeps one
//! representative: a trusted item over an untrusted one, then the earliest
//! published, then the first seen.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::model::NewsItem;

struct Group {
    anchor: String,
    best: NewsItem,
}

pub struct Deduplicator<F> {
    similarity_threshold: f64,
    is_trusted: F,
}

impl<F> Deduplicator<F>
where
    F: Fn(&NewsItem) -> bool,
{
    pub fn new(similarity_threshold: f64, is_trusted: F) -> Self {
        Self {
            similarity_threshold,
            is_trusted,
        }
    }

    /// Output keeps the order in which groups were first seen.
    pub fn dedupe(&self, items: Vec<NewsItem>) -> Vec<NewsItem> {
        let before = items.len();
        let mut seen_links = HashSet::new();
        let mut groups: Vec<Group> = Vec::new();
        let mut by_fingerprint: HashMap<String, usize> = HashMap::new();

        for item in items {
            if !seen_links.insert(item.link.clone()) {
                debug!("Duplicate link dropped: {}", item.link);
                continue;
            }

            let index = match by_fingerprint.get(&item.fingerprint) {
                Some(&index) => index,
                None => {
                    let key = item.normalized_title();
                    let index = match self.find_similar(&groups, &key) {
                        Some(index) => {
                            debug!(
                                "Merging '{}' into near-duplicate '{}'",
                                item.title, groups[index].best.title
                            );
                            index
                        }
                        None => {
                            groups.push(Group {
                                anchor: key,
                                best: item.clone(),
                            });
                            groups.len() - 1
                        }
                    };
                    by_fingerprint.insert(item.fingerprint.clone(), index);
                    index
                }
            };

            let group = &mut groups[index];
            if self.prefer(&item, &group.best) {
                group.best = item;
            }
        }

        let deduped: Vec<NewsItem> = groups.into_iter().map(|g| g.best).collect();
        info!("Deduplicated {} items down to {}", before, deduped.len());
        deduped
    }

    fn find_similar(&self, groups: &[Group], key: &str) -> Option<usize> {
        if self.similarity_threshold >= 1.0 {
            return None;
        }
        groups.iter().position(|group| {
            strsim::normalized_levenshtein(&group.anchor, key) >= self.similarity_threshold
        })
    }

    /// Whether `candidate` should replace `current` as a group's representative.
    fn prefer(&self, candidate: &NewsItem, current: &NewsItem) -> bool {
        let candidate_trusted = (self.is_trusted)(candidate);
        let current_trusted = (self.is_trusted)(current);
        if candidate_trusted != current_trusted {
            return candidate_trusted;
        }

        match (candidate.published_at, current.published_at) {
            (Some(c), Some(p)) => c < p,
            (Some(_), None) => true,
            _ => false,
        }
    }
}
