use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{raw_value::RawValueSource, sensor::Sensor};

/// State class as announced by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EsphomeStateClass {
    None,
    Measurement,
    TotalIncreasing,
    Total,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastResetType {
    #[default]
    None,
    Never,
    Auto,
}

/// State class exposed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStateClass {
    Measurement,
    TotalIncreasing,
    Total,
}

impl FromStr for EsphomeStateClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "" => Ok(EsphomeStateClass::None),
            "measurement" => Ok(EsphomeStateClass::Measurement),
            "total_increasing" => Ok(EsphomeStateClass::TotalIncreasing),
            "total" => Ok(EsphomeStateClass::Total),
            _ => Err(format!("unknown state class {}", s)),
        }
    }
}

impl FromStr for LastResetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "" => Ok(LastResetType::None),
            "never" => Ok(LastResetType::Never),
            "auto" => Ok(LastResetType::Auto),
            _ => Err(format!("unknown last reset type {}", s)),
        }
    }
}

pub fn map_state_class(
    state_class: EsphomeStateClass,
    last_reset: LastResetType,
) -> Option<SensorStateClass> {
    match state_class {
        EsphomeStateClass::None => None,
        // legacy devices flag counters as measurement + auto reset
        EsphomeStateClass::Measurement if last_reset == LastResetType::Auto => {
            Some(SensorStateClass::TotalIncreasing)
        }
        EsphomeStateClass::Measurement => Some(SensorStateClass::Measurement),
        EsphomeStateClass::TotalIncreasing => Some(SensorStateClass::TotalIncreasing),
        EsphomeStateClass::Total => Some(SensorStateClass::Total),
    }
}

/// A plain numeric sensor reported by the device, shown as-is.
#[derive(Debug, Clone)]
pub struct EsphomeSensor {
    entity_id: String,
    name: String,
    unit: Option<String>,
    accuracy_decimals: usize,
    state_class: Option<SensorStateClass>,
}

impl EsphomeSensor {
    pub fn new(entity_id: &str, name: &str, accuracy_decimals: usize) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            name: name.to_string(),
            unit: None,
            accuracy_decimals,
            state_class: None,
        }
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        // the device API sends "" for no unit
        self.unit = Some(unit).filter(|u| !u.is_empty()).map(str::to_string);
        self
    }

    pub fn with_state_class(
        mut self,
        state_class: EsphomeStateClass,
        last_reset: LastResetType,
    ) -> Self {
        self.state_class = map_state_class(state_class, last_reset);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_of_measurement(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn state_class(&self) -> Option<SensorStateClass> {
        self.state_class
    }

    pub fn native_value(&self, source: &dyn RawValueSource) -> Option<String> {
        format_value(source.raw_value(&self.entity_id), self.accuracy_decimals)
    }
}

pub fn format_value(value: Option<f64>, accuracy_decimals: usize) -> Option<String> {
    value
        .filter(|v| v.is_finite())
        .map(|v| format!("{:.*}", accuracy_decimals, v))
}

impl Sensor for EsphomeSensor {
    fn unique_id(&self) -> String {
        self.entity_id.clone()
    }

    fn add_json_value(&self, source: &dyn RawValueSource, map: &mut Map<String, Value>) {
        map.insert(
            self.entity_id.clone(),
            json!({
                "name": self.name,
                "state": self.native_value(source),
                "unit": self.unit,
                "state_class": self.state_class,
            }),
        );
    }

    fn pretty_print(&self, source: &dyn RawValueSource) -> String {
        format!(
            "{}: {} {}",
            self.name,
            self.native_value(source)
                .unwrap_or_else(|| "unknown".to_string()),
            self.unit.as_deref().unwrap_or("")
        )
        .trim_end()
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn source(state: &str) -> HashMap<String, String> {
        let mut states = HashMap::new();
        states.insert("sensor.tank_resistance".to_string(), state.to_string());
        states
    }

    #[test]
    fn test_native_value_uses_accuracy() {
        let sensor = EsphomeSensor::new("sensor.tank_resistance", "Tank resistance", 2);
        assert_eq!(
            sensor.native_value(&source("87.126")),
            Some("87.13".to_string())
        );

        let sensor = EsphomeSensor::new("sensor.tank_resistance", "Tank resistance", 0);
        assert_eq!(sensor.native_value(&source("87.6")), Some("88".to_string()));
    }

    #[test]
    fn test_native_value_missing() {
        let sensor = EsphomeSensor::new("sensor.tank_resistance", "Tank resistance", 1);
        assert_eq!(sensor.native_value(&source("unavailable")), None);
        assert_eq!(sensor.native_value(&source("nan")), None);
        assert_eq!(sensor.native_value(&HashMap::<String, String>::new()), None);
    }

    #[test]
    fn test_state_class_mapping() {
        assert_eq!(
            map_state_class(EsphomeStateClass::None, LastResetType::Auto),
            None
        );
        assert_eq!(
            map_state_class(EsphomeStateClass::Measurement, LastResetType::None),
            Some(SensorStateClass::Measurement)
        );
        assert_eq!(
            map_state_class(EsphomeStateClass::Measurement, LastResetType::Auto),
            Some(SensorStateClass::TotalIncreasing)
        );
        assert_eq!(
            map_state_class(EsphomeStateClass::Total, LastResetType::Never),
            Some(SensorStateClass::Total)
        );
        assert_eq!(
            "total_increasing".parse::<EsphomeStateClass>(),
            Ok(EsphomeStateClass::TotalIncreasing)
        );
    }

    #[test]
    fn test_state_class_from_device_strings() {
        let state_class = "measurement".parse::<EsphomeStateClass>().unwrap();
        let last_reset = "auto".parse::<LastResetType>().unwrap();
        let sensor = EsphomeSensor::new("sensor.fuel_used", "Fuel used", 1)
            .with_state_class(state_class, last_reset);
        assert_eq!(sensor.state_class(), Some(SensorStateClass::TotalIncreasing));

        let mut map = Map::new();
        sensor.add_json_value(&source("3"), &mut map);
        assert_eq!(map["sensor.fuel_used"]["state_class"], json!("total_increasing"));

        assert!("hourly".parse::<LastResetType>().is_err());
        assert!("cumulative".parse::<EsphomeStateClass>().is_err());
    }

    #[test]
    fn test_pretty_print_and_json() {
        let sensor = EsphomeSensor::new("sensor.tank_resistance", "Tank resistance", 1)
            .with_unit("Ω")
            .with_state_class(EsphomeStateClass::Measurement, LastResetType::None);
        let states = source("120");

        assert_eq!(sensor.pretty_print(&states), "Tank resistance: 120.0 Ω");

        let mut map = Map::new();
        sensor.add_json_value(&states, &mut map);
        assert_eq!(map["sensor.tank_resistance"]["state"], json!("120.0"));
        assert_eq!(
            map["sensor.tank_resistance"]["state_class"],
            json!("measurement")
        );
    }
}
