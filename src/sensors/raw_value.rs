use std::collections::HashMap;

pub const STATE_UNKNOWN: &str = "unknown";
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// Parses a host state string into a raw reading.
///
/// `unknown`, `unavailable`, anything that is not a number and non-finite
/// numbers all count as missing.
pub fn parse_raw_state(state: &str) -> Option<f64> {
    let state = state.trim();
    if state.is_empty() || state == STATE_UNKNOWN || state == STATE_UNAVAILABLE {
        return None;
    }

    state.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Where calibrated sensors look up the state of the raw sensor they follow.
pub trait RawValueSource {
    fn raw_state(&self, entity_id: &str) -> Option<String>;

    fn raw_value(&self, entity_id: &str) -> Option<f64> {
        self.raw_state(entity_id)
            .as_deref()
            .and_then(parse_raw_state)
    }
}

impl RawValueSource for HashMap<String, String> {
    fn raw_state(&self, entity_id: &str) -> Option<String> {
        self.get(entity_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_raw_state() {
        assert_eq!(parse_raw_state("12.5"), Some(12.5));
        assert_eq!(parse_raw_state(" 190 "), Some(190.0));
        assert_eq!(parse_raw_state("-3"), Some(-3.0));
        assert_eq!(parse_raw_state("unknown"), None);
        assert_eq!(parse_raw_state("unavailable"), None);
        assert_eq!(parse_raw_state(""), None);
        assert_eq!(parse_raw_state("twelve"), None);
        assert_eq!(parse_raw_state("NaN"), None);
        assert_eq!(parse_raw_state("inf"), None);
    }

    #[test]
    fn test_map_source() {
        let mut states = HashMap::new();
        states.insert("sensor.tank_raw".to_string(), "87.0".to_string());
        states.insert("sensor.offline".to_string(), "unavailable".to_string());

        assert_eq!(states.raw_value("sensor.tank_raw"), Some(87.0));
        assert_eq!(states.raw_value("sensor.offline"), None);
        assert_eq!(states.raw_value("sensor.missing"), None);
    }
}
