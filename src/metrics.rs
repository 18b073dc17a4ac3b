//! Prometheus text exposition of feed statistics.

use crate::stats::StatsSummary;

fn push_metric(
    output: &mut String,
    name: &str,
    kind: &str,
    help: &str,
    value: impl std::fmt::Display,
) {
    output.push_str(&format!("# HELP {} {}\n", name, help));
    output.push_str(&format!("# TYPE {} {}\n", name, kind));
    output.push_str(&format!("{} {}\n", name, value));
}

/// Format statistics as Prometheus text format.
pub fn format_prometheus_metrics(summary: &StatsSummary, aircraft_tracked: usize) -> String {
    let mut output = String::with_capacity(2048);

    push_metric(
        &mut output,
        "adsb_uptime_seconds",
        "gauge",
        "Time since the service started",
        format!("{:.3}", summary.elapsed_secs),
    );
    push_metric(
        &mut output,
        "adsb_aircraft_tracked",
        "gauge",
        "Aircraft currently held in the registry",
        aircraft_tracked,
    );
    push_metric(
        &mut output,
        "adsb_lines_received_total",
        "counter",
        "Non-empty lines read from the SBS feed",
        summary.lines_received,
    );
    push_metric(
        &mut output,
        "adsb_bytes_received_total",
        "counter",
        "Bytes of line data read from the SBS feed",
        summary.bytes_received,
    );
    push_metric(
        &mut output,
        "adsb_messages_applied_total",
        "counter",
        "MSG records merged into the registry",
        summary.messages_applied,
    );
    push_metric(
        &mut output,
        "adsb_non_message_lines_total",
        "counter",
        "Lines that were not MSG records",
        summary.non_message_lines,
    );
    push_metric(
        &mut output,
        "adsb_rejected_lines_total",
        "counter",
        "MSG lines rejected as malformed",
        summary.rejected_lines,
    );
    push_metric(
        &mut output,
        "adsb_connections_total",
        "counter",
        "Successful connections to the SBS feed",
        summary.connections,
    );
    push_metric(
        &mut output,
        "adsb_connection_failures_total",
        "counter",
        "Feed connections that failed or ended in an error",
        summary.connection_failures,
    );
    push_metric(
        &mut output,
        "adsb_publish_batches_total",
        "counter",
        "Publish ticks that emitted at least one snapshot",
        summary.publish_batches,
    );
    push_metric(
        &mut output,
        "adsb_events_published_total",
        "counter",
        "Aircraft snapshots sent to subscribers",
        summary.events_published,
    );
    push_metric(
        &mut output,
        "adsb_messages_per_second",
        "gauge",
        "Average message processing rate",
        format!("{:.3}", summary.messages_per_second),
    );

    if let Some(ref batch) = summary.batch_percentiles {
        output.push_str("# HELP adsb_batch_size Aircraft snapshots per publish batch\n");
        output.push_str("# TYPE adsb_batch_size summary\n");
        output.push_str(&format!("adsb_batch_size{{quantile=\"0.5\"}} {}\n", batch.p50));
        output.push_str(&format!("adsb_batch_size{{quantile=\"0.9\"}} {}\n", batch.p90));
        output.push_str(&format!("adsb_batch_size{{quantile=\"0.99\"}} {}\n", batch.p99));
        output.push_str(&format!("adsb_batch_size_count {}\n", summary.publish_batches));
    }

    output
}
