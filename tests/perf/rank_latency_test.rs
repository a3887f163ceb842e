use std::time::Instant;

use crate::model::Candidate;
use crate::search::rank_and_filter;

fn p95_ms(samples: &mut [f64]) -> f64 {
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let last = samples.len().saturating_sub(1);
    let idx = ((last as f64) * 0.95).round() as usize;
    samples[idx.min(last)]
}

#[test]
fn keystroke_rank_p95_under_budget() {
    let mut candidates: Vec<Candidate> = (0..2_000)
        .map(|i| Candidate::new(&i.to_string(), &format!("Project Notes {i:04}")))
        .collect();
    candidates.push(Candidate::new("papers", "Research Papers"));

    for _ in 0..10 {
        let _ = rank_and_filter(&candidates, "respap");
    }

    let mut batch_p95 = Vec::with_capacity(5);
    for _ in 0..5 {
        let mut samples = Vec::with_capacity(20);
        for _ in 0..20 {
            let start = Instant::now();
            let ranked = rank_and_filter(&candidates, "respap");
            samples.push(start.elapsed().as_secs_f64() * 1000.0);
            assert_eq!(ranked[0].candidate.id, "papers");
        }
        batch_p95.push(p95_ms(&mut samples));
    }

    batch_p95.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median_p95 = batch_p95[batch_p95.len() / 2];

    assert!(
        median_p95 <= 100.0,
        "median batch p95 too high: {median_p95:.3}ms (budget 100.0ms); batches={batch_p95:?}",
    );
}
