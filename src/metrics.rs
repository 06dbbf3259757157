//! Metrics Sink
//!
//! A write-only sink of labeled gauges. Producers set values; the admin
//! endpoint renders the current snapshot in Prometheus text form. There is
//! no history and no aggregation here, only last-write-wins gauges.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use parking_lot::Mutex;

/// Labeled gauge store. Keys are rendered `name{label="value",...}` series
/// identifiers, so iteration order (and the rendered output) is stable.
#[derive(Default)]
pub struct Metrics {
    gauges: Mutex<BTreeMap<String, f64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics::default()
    }

    /// Set one gauge. Labels are rendered in the order given.
    pub fn set(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        let key = series_key(name, labels);
        self.gauges.lock().insert(key, value);
    }

    /// Number of distinct series seen so far.
    pub fn len(&self) -> usize {
        self.gauges.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.gauges.lock().is_empty()
    }

    /// Render all gauges in Prometheus text exposition form.
    pub fn render(&self) -> String {
        let gauges = self.gauges.lock();
        let mut out = String::with_capacity(gauges.len() * 48);
        for (series, value) in gauges.iter() {
            let _ = writeln!(out, "{series} {value}");
        }
        out
    }
}

fn series_key(name: &str, labels: &[(&str, &str)]) -> String {
    if labels.is_empty() {
        return name.to_string();
    }
    let rendered: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", v.replace('"', "\\\"")))
        .collect();
    format!("{name}{{{}}}", rendered.join(","))
}
