use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
tracking:
  height_tolerance: 0.3
  grace_threshold: 10
  min_confidence: 0.45
input:
  log_dir: "detections"
  drain_at_end: true
sink:
  url: "http://localhost:5000/api/data"
  timeout_secs: 5
  enabled: true
location:
  latitude: 51.5007
  longitude: -0.1246
logging:
  level: "traffic_analyser=info"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.tracking.grace_threshold, 10);
        assert!((config.tracking.height_tolerance - 0.3).abs() < 1e-6);
        assert_eq!(config.sink.url, "http://localhost:5000/api/data");
        assert_eq!(config.location.latitude, Some(51.5007));
        assert!(config.input.drain_at_end);
    }

    #[test]
    fn test_location_may_be_absent() {
        let yaml = r#"
tracking:
  height_tolerance: 0.3
  grace_threshold: 10
  min_confidence: 0.45
input:
  log_dir: "detections"
  drain_at_end: false
sink:
  url: "http://localhost:5000/api/data"
  timeout_secs: 5
  enabled: false
location:
  latitude: null
  longitude: null
logging:
  level: "info"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.location.latitude.is_none());
        assert!(config.location.longitude.is_none());
    }
}
