//! Voting consensus over successful provider responses.
//!
//! Responses are clustered greedily by word-set Jaccard similarity. Each
//! cluster votes with the summed confidence of its members; the leading
//! cluster supplies the consensus content when its share of the votes clears
//! the consensus threshold.

use log::debug;
use std::collections::HashSet;

use crate::orchestrator::types::{ConsensusResult, Disagreement, IndividualResponse, VotingResult};

fn word_set(content: &str) -> HashSet<String> {
    content
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Jaccard similarity of the lowercase word sets of `a` and `b`
///
/// Two texts without any words are considered identical.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let a = word_set(a);
    let b = word_set(b);
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(&b).count() as f64;
    let union = a.union(&b).count() as f64;
    intersection / union
}

struct Cluster {
    representative: usize,
    members: Vec<usize>,
    votes: f64,
}

/// Build the consensus for a non-empty set of successful responses
///
/// # Parameters
/// * `responses` - Successful responses in dispatch order
/// * `clustering_threshold` - Minimum similarity to join a cluster
/// * `consensus_threshold` - Vote share the leading cluster needs
pub fn build_consensus(
    responses: &[IndividualResponse],
    clustering_threshold: f64,
    consensus_threshold: f64,
) -> ConsensusResult {
    if responses.is_empty() {
        return ConsensusResult {
            agreement_level: 0.0,
            consensus_content: String::new(),
            disagreements: Vec::new(),
            voting_results: Vec::new(),
        };
    }

    let agreement_level =
        responses.iter().map(|r| r.response.confidence).sum::<f64>() / responses.len() as f64;

    let mut clusters: Vec<Cluster> = Vec::new();
    for (i, r) in responses.iter().enumerate() {
        let joined = clusters.iter_mut().find(|c| {
            jaccard_similarity(&responses[c.representative].response.content, &r.response.content)
                >= clustering_threshold
        });
        match joined {
            Some(cluster) => {
                cluster.members.push(i);
                cluster.votes += r.response.confidence;
            }
            None => clusters.push(Cluster {
                representative: i,
                members: vec![i],
                votes: r.response.confidence,
            }),
        }
    }

    // Stable: equal votes keep dispatch order
    clusters.sort_by(|a, b| b.votes.total_cmp(&a.votes));

    let total_votes: f64 = clusters.iter().map(|c| c.votes).sum();
    let share_of = |c: &Cluster| {
        if total_votes > 0.0 {
            c.votes / total_votes
        } else {
            c.members.len() as f64 / responses.len() as f64
        }
    };

    let voting_results: Vec<VotingResult> = clusters
        .iter()
        .map(|c| VotingResult {
            content: responses[c.representative].response.content.clone(),
            providers: c.members.iter().map(|&i| responses[i].provider.clone()).collect(),
            votes: c.votes,
            share: share_of(c),
        })
        .collect();

    let leading = &clusters[0];
    let leading_share = share_of(leading);
    let consensus_content = if leading_share >= consensus_threshold {
        responses[leading.representative].response.content.clone()
    } else {
        responses[0].response.content.clone()
    };

    let disagreements: Vec<Disagreement> = responses
        .iter()
        .enumerate()
        .filter(|(i, _)| !leading.members.contains(i))
        .map(|(_, r)| Disagreement {
            provider: r.provider.clone(),
            content: r.response.content.clone(),
            similarity: jaccard_similarity(&consensus_content, &r.response.content),
        })
        .collect();

    debug!(
        "Consensus: {} clusters, leading share {:.2} (threshold {:.2}), {} disagreements",
        clusters.len(),
        leading_share,
        consensus_threshold,
        disagreements.len()
    );

    ConsensusResult {
        agreement_level,
        consensus_content,
        disagreements,
        voting_results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderResponse;
    use chrono::Utc;

    fn response(provider: &str, content: &str, confidence: f64) -> IndividualResponse {
        IndividualResponse {
            provider: provider.to_string(),
            response: ProviderResponse {
                content: content.to_string(),
                confidence,
                tokens_used: 10,
                response_time_ms: 5,
                model: "mock".to_string(),
                timestamp: Utc::now(),
            },
            response_time_ms: 5,
            cost: 0.0,
        }
    }

    #[test]
    fn test_jaccard_similarity() {
        assert_eq!(jaccard_similarity("the cat sat", "The cat, sat!"), 1.0);
        assert_eq!(jaccard_similarity("a b", "c d"), 0.0);
        assert!((jaccard_similarity("a b c", "a b d") - 0.5).abs() < 1e-9);
        assert_eq!(jaccard_similarity("", "  "), 1.0);
    }

    #[test]
    fn test_majority_cluster_wins() {
        let responses = vec![
            response("alpha", "the button is misaligned", 0.6),
            response("beta", "contrast is too low", 0.9),
            response("gamma", "contrast is too low", 0.8),
        ];
        let consensus = build_consensus(&responses, 0.8, 0.5);

        assert_eq!(consensus.consensus_content, "contrast is too low");
        assert_eq!(consensus.voting_results.len(), 2);
        assert_eq!(consensus.voting_results[0].providers, vec!["beta", "gamma"]);
        assert_eq!(consensus.disagreements.len(), 1);
        assert_eq!(consensus.disagreements[0].provider, "alpha");
        assert!((consensus.agreement_level - (0.6 + 0.9 + 0.8) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_weak_majority_falls_back_to_first_response() {
        let responses = vec![
            response("alpha", "the button is misaligned", 0.6),
            response("beta", "contrast is too low", 0.7),
        ];
        let consensus = build_consensus(&responses, 0.8, 0.7);

        assert_eq!(consensus.consensus_content, "the button is misaligned");
        assert_eq!(consensus.disagreements.len(), 1);
        assert_eq!(consensus.disagreements[0].provider, "alpha");
    }

    #[test]
    fn test_single_response_is_unanimous() {
        let responses = vec![response("alpha", "looks fine", 0.4)];
        let consensus = build_consensus(&responses, 0.8, 0.7);

        assert_eq!(consensus.consensus_content, "looks fine");
        assert_eq!(consensus.voting_results[0].share, 1.0);
        assert!(consensus.disagreements.is_empty());
    }
}
