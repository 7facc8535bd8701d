//! Report generation for metrics summaries.

use std::fmt::{Error as FmtError, Write as _};

use super::snapshot::MetricsSnapshot;

/// Metrics report generator
pub struct MetricsReport;

impl MetricsReport {
    /// Formats a snapshot as a human-readable summary.
    ///
    /// `today` and `month` are the ledger keys for the current period.
    ///
    /// # Errors
    /// Returns an error if formatting fails
    pub fn format_summary(
        snapshot: &MetricsSnapshot,
        today: &str,
        month: &str,
    ) -> Result<String, FmtError> {
        let mut output = String::new();

        writeln!(output, "Total Requests: {}", snapshot.requests.total)?;
        writeln!(
            output,
            "Provider Calls: {} ok / {} failed ({:.1}% errors)",
            snapshot.requests.success,
            snapshot.requests.error,
            snapshot.error_rate() * 100.0
        )?;
        writeln!(
            output,
            "Cache: {} hits / {} misses ({:.1}% hit rate)",
            snapshot.cache.hits,
            snapshot.cache.misses,
            snapshot.cache_hit_rate() * 100.0
        )?;
        writeln!(output, "Template Fallbacks: {}", snapshot.template_fallbacks)?;

        let latency = &snapshot.latency;
        writeln!(
            output,
            "Average Latency: {}ms (min {}ms, max {}ms)",
            latency.average_ms(),
            latency.min_ms.unwrap_or(0),
            latency.max_ms
        )?;

        writeln!(
            output,
            "Cost: ${:.4} today, ${:.4} this month, ${:.4} total",
            snapshot.costs.for_day(today),
            snapshot.costs.for_month(month),
            snapshot.costs.total_usd
        )?;

        if !snapshot.providers.is_empty() {
            writeln!(output, "\nProviders:")?;
            for (provider, stats) in &snapshot.providers {
                writeln!(
                    output,
                    "  {provider}: {} ok, {} failed, {} tokens, avg {}ms - ${:.4}",
                    stats.successes,
                    stats.errors,
                    stats.tokens,
                    stats.avg_latency_ms(),
                    stats.cost_usd
                )?;
            }
        }

        let alerts = &snapshot.alerts;
        writeln!(
            output,
            "\nAlerts: {} error rate, {} latency, {} cost",
            alerts.error_rate_fired, alerts.latency_fired, alerts.cost_fired
        )?;

        if !snapshot.variants.is_empty() {
            writeln!(output, "\nExperiment Variants:")?;
            for (variant, sessions) in &snapshot.variants {
                writeln!(output, "  {variant}: {sessions} sessions")?;
            }
        }

        Ok(output)
    }
}
