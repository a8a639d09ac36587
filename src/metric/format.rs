//! Wire forms of a [`Metric`]: a structured (JSON) object and a plaintext line

use serde_json::{Map, Value};

use super::{Metric, MetricValue};
use crate::error::{MetricsdError, Result};
use crate::util::local_hostname;

/// Schema marker carried in every structured form's `tags`
pub const SCHEMA_VERSION: &str = "1";

/// Top-level keys of the structured form. `data` entries using one of these
/// names are dropped from `tags`.
const CLAIMED_KEYS: [&str; 6] = ["timestamp", "unit", "name", "target_type", "result", "host"];

impl Metric {
    /// Structured form used by JSON-speaking sinks.
    ///
    /// `name` is `<from>.<data.name>`, falling back to the metric's own name
    /// when `data` has none.
    pub fn to_structured(&self) -> Result<Map<String, Value>> {
        let mut out = Map::new();

        let short_name = match self.data.get("name") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => self.name.clone(),
        };

        out.insert("timestamp".into(), Value::from(self.timestamp.timestamp()));
        out.insert(
            "unit".into(),
            self.data.get("unit").cloned().unwrap_or(Value::Null),
        );
        out.insert("name".into(), Value::from(format!("{}.{}", self.from, short_name)));
        out.insert("target_type".into(), Value::from(self.metric_type.as_str()));
        out.insert("result".into(), self.value.to_json()?);

        let host = if self.host.is_empty() {
            local_hostname()
        } else {
            self.host.as_str()
        };
        out.insert("host".into(), Value::from(host));

        let mut tags = Map::new();
        tags.insert("version".into(), Value::from(SCHEMA_VERSION));
        for (k, v) in &self.tags {
            tags.insert(k.clone(), v.clone());
        }
        for (k, v) in &self.data {
            if !CLAIMED_KEYS.contains(&k.as_str()) {
                tags.insert(k.clone(), v.clone());
            }
        }
        out.insert("tags".into(), Value::Object(tags));

        Ok(out)
    }

    /// Structured form encoded as JSON bytes
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let structured = self.to_structured()?;
        Ok(serde_json::to_vec(&structured)?)
    }

    /// Line form: `<prefix><host>.<namespace>.<name> <value> <unix_timestamp>`.
    ///
    /// No trailing newline. The prefix is prepended verbatim.
    pub fn to_line(&self, prefix: &str) -> Result<String> {
        let key = format!("{}{}.{}.{}", prefix, self.host, self.namespace(), self.name);
        if key.chars().any(char::is_whitespace) {
            return Err(MetricsdError::Encode(format!(
                "metric key {:?} contains whitespace",
                key
            )));
        }

        match &self.value {
            MetricValue::Float(v) if !v.is_finite() => {
                return Err(MetricsdError::Encode(format!(
                    "{} has non-finite value {}",
                    key, v
                )));
            }
            MetricValue::Text(v) if v.is_empty() || v.chars().any(char::is_whitespace) => {
                return Err(MetricsdError::Encode(format!(
                    "{} has value {:?} that cannot be written on one line",
                    key, v
                )));
            }
            _ => {}
        }

        Ok(format!("{} {} {}", key, self.value, self.timestamp.timestamp()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{HostResolver, MetricKind};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn disk_metric() -> Metric {
        let mut metric = Metric::new(
            "diskspace",
            "diskspace",
            MetricKind::Gauge,
            "byte_used",
            5i64,
            crate::fields! { "unit" => "GB", "name" => "byte_used" },
        )
        .with_timestamp(Utc.timestamp_opt(100, 0).unwrap());
        metric.enrich(&HostResolver::new("h"));
        metric
    }

    #[test]
    fn test_line_form() {
        assert_eq!(disk_metric().to_line("").unwrap(), "h.diskspace.byte_used 5 100");
    }

    #[test]
    fn test_line_form_with_prefix_and_path() {
        let metric = disk_metric().with_path("diskspace.root");
        assert_eq!(
            metric.to_line("servers.").unwrap(),
            "servers.h.diskspace.root.byte_used 5 100"
        );
        // Prefix is glued on as-is
        assert_eq!(
            metric.to_line("prod").unwrap(),
            "prodh.diskspace.root.byte_used 5 100"
        );
    }

    #[test]
    fn test_line_form_rejects_unencodable_values() {
        let nan = Metric::new("cpu", "cpu", MetricKind::Gauge, "idle", f64::NAN, crate::fields! {});
        assert!(matches!(nan.to_line(""), Err(MetricsdError::Encode(_))));

        let spaced = Metric::new("x", "x", MetricKind::Gauge, "state", "not ok", crate::fields! {});
        assert!(spaced.to_line("").is_err());

        let bad_name = Metric::new("x", "x", MetricKind::Gauge, "a b", 1i64, crate::fields! {});
        assert!(bad_name.to_line("").is_err());
    }

    #[test]
    fn test_structured_form() {
        let structured = Value::Object(disk_metric().to_structured().unwrap());
        assert_eq!(
            structured,
            json!({
                "timestamp": 100,
                "unit": "GB",
                "name": "diskspace.byte_used",
                "target_type": "gauge",
                "result": 5,
                "host": "h",
                "tags": { "version": "1" }
            })
        );
    }

    #[test]
    fn test_structured_form_drops_colliding_data_keys() {
        let metric = Metric::new(
            "diskspace",
            "diskspace",
            MetricKind::Gauge,
            "byte_used",
            5i64,
            crate::fields! {
                "unit" => "GB",
                "name" => "byte_used",
                "mountpoint" => "root",
                "host" => "spoofed",
                "result" => 99,
            },
        );

        let structured = metric.to_structured().unwrap();
        assert_eq!(structured["host"], json!(metric.host()));
        assert_eq!(structured["result"], json!(5));
        assert_eq!(
            structured["tags"],
            json!({ "version": "1", "mountpoint": "root" })
        );
    }

    #[test]
    fn test_structured_name_falls_back_to_metric_name() {
        let metric = Metric::new("loadavg", "loadavg", MetricKind::Gauge, "15", 0.5, crate::fields! {});
        let structured = metric.to_structured().unwrap();
        assert_eq!(structured["name"], json!("loadavg.15"));
        assert_eq!(structured["unit"], Value::Null);
    }

    #[test]
    fn test_json_is_reproducible() {
        let metric = disk_metric();
        assert_eq!(metric.to_json().unwrap(), metric.to_json().unwrap());
        assert!(Metric::new("x", "x", MetricKind::Gauge, "y", f64::INFINITY, crate::fields! {})
            .to_json()
            .is_err());
    }
}
