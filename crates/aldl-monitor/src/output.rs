//! Text and JSON rendering for aldl-monitor

use aldl_core::definition::DecoderSchema;
use aldl_core::protocol::{CycleStats, PortInfo};
use aldl_core::realtime::Snapshot;
use serde::Serialize;

/// One port line for the `ports` command
pub fn port_line(port: &PortInfo) -> String {
    let mut line = port.name.clone();
    if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
        line.push_str(&format!("  [{vid:04x}:{pid:04x}]"));
    }
    let label: Vec<&str> = [port.manufacturer.as_deref(), port.product.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if !label.is_empty() {
        line.push_str("  ");
        line.push_str(&label.join(" "));
    }
    line
}

/// Key/value summary of a compiled definition
pub fn schema_summary(schema: &DecoderSchema) -> Vec<(&'static str, String)> {
    vec![
        ("Name", schema.name.clone()),
        ("Mask", schema.mask.clone()),
        ("Baud rate", schema.baud_rate.to_string()),
        ("Echo cancel", schema.echo_cancel.to_string()),
        ("Request", hex_bytes(&schema.request_command)),
        ("Frame length", schema.expected_frame_length.to_string()),
        ("Parameters", schema.parameters.len().to_string()),
        ("Bit flags", schema.bit_flags.len().to_string()),
        (
            "Gauges",
            schema
                .gauges
                .iter()
                .map(|g| g.field.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        ),
    ]
}

/// Print a summary, one `key: value` per line
pub fn print_kv(pairs: &[(&str, String)]) {
    for (key, value) in pairs {
        println!("{key}: {value}");
    }
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Single-line text rendering of a snapshot, in schema parameter order
pub fn snapshot_line(snapshot: &Snapshot, schema: &DecoderSchema) -> String {
    let mut fields = vec![snapshot.captured_at().format("%H:%M:%S%.3f").to_string()];
    for param in &schema.parameters {
        let Some(value) = snapshot.get(&param.id) else {
            continue;
        };
        if param.units.is_empty() {
            fields.push(format!("{}={value:.2}", param.id));
        } else {
            fields.push(format!("{}={value:.2} {}", param.id, param.units));
        }
    }
    let set: Vec<&str> = snapshot
        .flags()
        .iter()
        .filter(|(_, on)| **on)
        .map(|(id, _)| id.as_str())
        .collect();
    if !set.is_empty() {
        fields.push(format!("[{}]", set.join(" ")));
    }
    fields.join("  ")
}

/// Compact JSON rendering of a snapshot
pub fn snapshot_json(snapshot: &Snapshot) -> String {
    serde_json::to_string(snapshot).unwrap_or_else(|_| "{}".to_string())
}

/// Closing statistics line for the `stream` command
pub fn stats_line(stats: &CycleStats) -> String {
    format!(
        "{} frames, {} dropped (transport {}, no sync {}, short {}, checksum {})",
        stats.frames,
        stats.dropped(),
        stats.transport_errors,
        stats.sync_misses,
        stats.short_frames,
        stats.checksum_errors
    )
}

fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
