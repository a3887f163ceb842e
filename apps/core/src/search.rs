use crate::fuzzy::{match_text, MatchResult};
use crate::model::Candidate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    pub result: MatchResult,
}

/// Matches every candidate title against `query`, drops the misses and orders
/// the rest by score, highest first.
///
/// Equal scores keep their input order so the list does not reshuffle between
/// keystrokes.
pub fn rank_and_filter(candidates: &[Candidate], query: &str) -> Vec<RankedCandidate> {
    let mut scored: Vec<(usize, RankedCandidate)> = candidates
        .iter()
        .enumerate()
        .filter_map(|(index, candidate)| {
            let result = match_text(&candidate.title, query);
            result.matched.then(|| {
                (
                    index,
                    RankedCandidate {
                        candidate: candidate.clone(),
                        result,
                    },
                )
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.1.result
            .score
            .cmp(&a.1.result.score)
            .then_with(|| a.0.cmp(&b.0))
    });

    scored.into_iter().map(|(_, ranked)| ranked).collect()
}

/// The name to offer for a new set: the trimmed query, when one was typed and
/// nothing matched it.
pub fn create_offer(query: &str, ranked: &[RankedCandidate]) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() || !ranked.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}
