use std::collections::HashSet;
use std::time::Duration;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use shared::types::{ProbeOutcome, RankedEndpoints, SrvEndpoint};
use crate::probe::Probe;

/// Probe every candidate and order the reachable ones by measured latency,
/// fastest first.
///
/// DNS priority and weight are deliberately ignored from here on: they encode
/// administrator intent for load distribution, while the round trip time is
/// what this host actually experiences. At most `max_concurrency` probes are
/// in flight; all of them finish (or are cancelled) before anything is sorted.
/// Cancelling `cancel` turns every probe still running into an unreachable
/// result.
pub async fn rank<P: Probe + ?Sized>(
    candidates: &[SrvEndpoint],
    probe: &P,
    max_concurrency: usize,
    limit: Option<usize>,
    cancel: &CancellationToken,
) -> RankedEndpoints {
    let kind = probe.protocol();
    tracing::info!(
        "Sorting {} {} servers by round trip time and removing unreachable servers",
        candidates.len(),
        kind
    );

    let outcomes: Vec<(usize, ProbeOutcome)> = stream::iter(candidates.iter().enumerate())
        .map(|(idx, candidate)| async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(
                        "{} probe of {}:{} cancelled",
                        kind,
                        candidate.host,
                        candidate.port
                    );
                    ProbeOutcome::Unreachable
                }
                outcome = probe.probe(&candidate.host, candidate.port) => outcome,
            };
            (idx, outcome)
        })
        .buffer_unordered(max_concurrency.max(1))
        .collect()
        .await;

    let mut reachable: Vec<(Duration, usize, String)> = outcomes
        .into_iter()
        .filter_map(|(idx, outcome)| match outcome {
            ProbeOutcome::Reachable { latency, uri } => Some((latency, idx, uri)),
            ProbeOutcome::Unreachable => None,
        })
        .collect();
    // Submission order breaks latency ties
    reachable.sort();
    tracing::debug!("{} servers sorted by round trip time: {:?}", kind, reachable);

    let mut seen = HashSet::new();
    let full: Vec<String> = reachable
        .into_iter()
        .filter_map(|(_, _, uri)| seen.insert(uri.clone()).then_some(uri))
        .collect();

    let ranked = RankedEndpoints::from_ordered(full, limit);
    if ranked.limited.len() < ranked.full.len() {
        tracing::info!(
            "Trimming list of {} {} servers to the fastest {}. Remaining servers: {:?}",
            ranked.full.len(),
            kind,
            ranked.limited.len(),
            ranked.limited
        );
    }
    ranked
}
