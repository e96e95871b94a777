use crate::engine::agents::NearbyAgent;
use crate::models::agent::DeliveryAgent;
use crate::models::assignment::{Candidate, ScoreBreakdown};

const DISTANCE_WEIGHT: f64 = 0.50;
const RATING_WEIGHT: f64 = 0.30;
const RELIABILITY_WEIGHT: f64 = 0.20;

/// Score given to agents nobody has rated yet.
const UNRATED_SCORE: f64 = 0.6;

/// Best candidate first.
pub fn rank_candidates(nearby: &[NearbyAgent]) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = nearby
        .iter()
        .map(|entry| {
            let (score, breakdown) = compute_score(&entry.agent, entry.distance_km);
            Candidate {
                agent_id: entry.agent.id,
                distance_km: entry.distance_km,
                score,
                score_breakdown: breakdown,
            }
        })
        .collect();

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates
}

pub fn compute_score(agent: &DeliveryAgent, distance_km: f64) -> (f64, ScoreBreakdown) {
    let breakdown = ScoreBreakdown {
        distance_score: distance_score(distance_km),
        rating_score: rating_score(agent),
        reliability_score: reliability_score(agent.fraud_reports, agent.negligence_reports),
    };

    let score = weighted_score(&breakdown);
    (score, breakdown)
}

pub fn weighted_score(breakdown: &ScoreBreakdown) -> f64 {
    (breakdown.distance_score * DISTANCE_WEIGHT)
        + (breakdown.rating_score * RATING_WEIGHT)
        + (breakdown.reliability_score * RELIABILITY_WEIGHT)
}

fn distance_score(distance_km: f64) -> f64 {
    1.0 / (1.0 + distance_km.max(0.0))
}

fn rating_score(agent: &DeliveryAgent) -> f64 {
    match agent.rating.average() {
        Some(average) => (average / 5.0).clamp(0.0, 1.0),
        None => UNRATED_SCORE,
    }
}

// Fraud weighs twice as much as negligence.
fn reliability_score(fraud_reports: u32, negligence_reports: u32) -> f64 {
    let penalty = 2.0 * fraud_reports as f64 + negligence_reports as f64;
    1.0 / (1.0 + penalty)
}
