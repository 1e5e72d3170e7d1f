//! Ranking scored candidates.

use campaignsmith_shared::ScoredArtifact;

/// The `k` best candidates by total score, highest first.
///
/// Ties keep their input order. The input is never reordered; the result
/// borrows from it. `k == 0` yields nothing and `k` past the end yields
/// every candidate.
pub fn select<A>(pairs: &[ScoredArtifact<A>], k: usize) -> Vec<&ScoredArtifact<A>> {
    let mut ranked: Vec<&ScoredArtifact<A>> = pairs.iter().collect();
    // `sort_by` is stable
    ranked.sort_by(|a, b| b.total_score().cmp(&a.total_score()));
    ranked.truncate(k);
    ranked
}
