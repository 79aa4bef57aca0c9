//! Search pipeline metrics.
//!
//! Counters and histograms for the search orchestration path, recorded
//! through whatever recorder the host process installs.

/// Metrics for the search orchestration phase
pub struct SearchMetrics;

impl SearchMetrics {
    pub fn record_search_started() {
        ::metrics::counter!("gymintel_searches_started_total").increment(1);
    }

    pub fn record_search_completed(duration_secs: f64, total_results: usize) {
        ::metrics::counter!("gymintel_searches_completed_total").increment(1);
        ::metrics::histogram!("gymintel_search_duration_seconds").record(duration_secs);
        ::metrics::histogram!("gymintel_search_result_count").record(total_results as f64);
    }

    pub fn record_search_failed() {
        ::metrics::counter!("gymintel_searches_failed_total").increment(1);
    }

    pub fn record_cache_hit() {
        ::metrics::counter!("gymintel_freshness_cache_hits_total").increment(1);
    }

    pub fn record_fetch_joined() {
        ::metrics::counter!("gymintel_fetches_joined_total").increment(1);
    }

    pub fn record_fetch_owned() {
        ::metrics::counter!("gymintel_fetches_owned_total").increment(1);
    }
}

/// Metrics for the reconciliation phase
pub struct ReconcileMetrics;

impl ReconcileMetrics {
    pub fn record_reconciled(raw_listings: usize, canonical_entities: usize, merged: usize) {
        ::metrics::histogram!("gymintel_reconcile_input_listings").record(raw_listings as f64);
        ::metrics::histogram!("gymintel_reconcile_output_entities")
            .record(canonical_entities as f64);
        ::metrics::counter!("gymintel_reconcile_merged_total").increment(merged as u64);
    }
}
