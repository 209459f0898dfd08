//! The `open_ports` gauge store and its text exposition.
use std::collections::HashSet;
use std::fmt::{self, Write};

use dashmap::DashMap;

pub const METRIC_NAME: &str = "open_ports";
const METRIC_HELP: &str = "Whether a declared container port accepted a TCP connection (1) or not (0)";

/// Identifies one exported gauge series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricKey {
    pub namespace: String,
    pub pod: String,
    pub port: u16,
}

impl MetricKey {
    pub fn new(namespace: impl Into<String>, pod: impl Into<String>, port: u16) -> Self {
        Self {
            namespace: namespace.into(),
            pod: pod.into(),
            port,
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.namespace, self.pod, self.port)
    }
}

/// Concurrent store of the latest probe result per series.
///
/// Writers for distinct keys never contend on the same shard lock for long;
/// series are only removed through [`GaugeStore::retain_observed`].
#[derive(Debug, Default)]
pub struct GaugeStore {
    gauges: DashMap<MetricKey, f64>,
}

impl GaugeStore {
    /// Publishes `1.0` for an open port and `0.0` for a closed one.
    pub fn set(&self, key: MetricKey, open: bool) {
        let value = if open { 1.0 } else { 0.0 };
        log::debug!(
            "Metric - namespace: {}, pod: {}, port: {}, open: {}",
            key.namespace,
            key.pod,
            key.port,
            value
        );
        self.gauges.insert(key, value);
    }

    pub fn get(&self, key: &MetricKey) -> Option<f64> {
        self.gauges.get(key).map(|value| *value)
    }

    /// Drops every series whose key is not in `observed` and returns how many
    /// were removed.
    pub fn retain_observed(&self, observed: &HashSet<MetricKey>) -> usize {
        let before = self.gauges.len();
        self.gauges.retain(|key, _| observed.contains(key));
        before.saturating_sub(self.gauges.len())
    }

    pub fn size(&self) -> usize {
        self.gauges.len()
    }

    /// Renders all series in the Prometheus text exposition format, sorted by
    /// namespace, pod and port.
    pub fn render(&self) -> String {
        let mut series: Vec<(MetricKey, f64)> = self
            .gauges
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        series.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = String::with_capacity(128 + series.len() * 64);
        // Writing into a String cannot fail.
        let _ = writeln!(out, "# HELP {METRIC_NAME} {METRIC_HELP}");
        let _ = writeln!(out, "# TYPE {METRIC_NAME} gauge");
        for (key, value) in series {
            let _ = writeln!(
                out,
                "{METRIC_NAME}{{namespace=\"{}\",pod=\"{}\",port=\"{}\"}} {}",
                escape_label_value(&key.namespace),
                escape_label_value(&key.pod),
                key.port,
                value
            );
        }
        out
    }
}

fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overwrites_value() {
        let store = GaugeStore::default();
        let key = MetricKey::new("default", "web", 80);
        store.set(key.clone(), true);
        assert_eq!(store.get(&key), Some(1.0));
        store.set(key.clone(), false);
        assert_eq!(store.get(&key), Some(0.0));
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_retain_observed_removes_stale_series() {
        let store = GaugeStore::default();
        let kept = MetricKey::new("default", "web", 80);
        let stale = MetricKey::new("default", "gone", 8080);
        store.set(kept.clone(), true);
        store.set(stale.clone(), true);

        let observed = HashSet::from([kept.clone()]);
        assert_eq!(store.retain_observed(&observed), 1);
        assert_eq!(store.get(&kept), Some(1.0));
        assert_eq!(store.get(&stale), None);
    }

    #[test]
    fn test_render_sorted_exposition() {
        let store = GaugeStore::default();
        store.set(MetricKey::new("kube-system", "dns", 53), false);
        store.set(MetricKey::new("default", "web", 443), true);
        store.set(MetricKey::new("default", "web", 80), true);

        let expected = "\
# HELP open_ports Whether a declared container port accepted a TCP connection (1) or not (0)
# TYPE open_ports gauge
open_ports{namespace=\"default\",pod=\"web\",port=\"80\"} 1
open_ports{namespace=\"default\",pod=\"web\",port=\"443\"} 1
open_ports{namespace=\"kube-system\",pod=\"dns\",port=\"53\"} 0
";
        assert_eq!(store.render(), expected);
    }

    #[test]
    fn test_render_escapes_label_values() {
        assert_eq!(escape_label_value(r#"a"b\c"#), r#"a\"b\\c"#);
        assert_eq!(escape_label_value("line\nbreak"), "line\\nbreak");
    }
}
