use log::info;
use serde_json::{json, Map, Value};

use crate::configuration::{
    config_store::{ConfigEntry, ConfigStore, StoreError},
    main_configuration::{
        CONF_CALIBRATION, CONF_INTERPOLATION, CONF_RAW_SENSOR_ID, CONF_UNIT, DEFAULT_CALIBRATION,
        DEFAULT_RAW_SENSOR_ID, DEFAULT_UNIT,
    },
};

use super::{
    interpolator::{interpolate, CalibrationError, CalibrationTable, InterpolationMethod},
    raw_value::RawValueSource,
    sensor::Sensor,
};

/// Follows a raw sensor and reports its value mapped through a calibration table.
#[derive(Debug, Clone)]
pub struct CalibratedSensor {
    entry_id: String,
    title: String,
    raw_sensor_id: String,
    unit: String,
    table: CalibrationTable,
    method: InterpolationMethod,
}

impl CalibratedSensor {
    pub fn from_entry(entry: &ConfigEntry) -> Result<Self, CalibrationError> {
        let method = match entry.merged().get(CONF_INTERPOLATION) {
            Some(Value::String(s)) => s.parse()?,
            _ => InterpolationMethod::default(),
        };

        let table =
            CalibrationTable::parse(&entry.read_string(CONF_CALIBRATION, DEFAULT_CALIBRATION));

        Ok(Self {
            entry_id: entry.entry_id.clone(),
            title: entry.title.clone(),
            raw_sensor_id: entry.read_string(CONF_RAW_SENSOR_ID, DEFAULT_RAW_SENSOR_ID),
            unit: entry.read_string(CONF_UNIT, DEFAULT_UNIT),
            table,
            method,
        })
    }

    pub fn name(&self) -> String {
        format!("{} Calibrated Sensor", self.title)
    }

    pub fn unit_of_measurement(&self) -> &str {
        &self.unit
    }

    pub fn raw_sensor_id(&self) -> &str {
        &self.raw_sensor_id
    }

    pub fn table(&self) -> &CalibrationTable {
        &self.table
    }

    pub fn method(&self) -> InterpolationMethod {
        self.method
    }

    pub fn raw_value(&self, source: &dyn RawValueSource) -> Option<f64> {
        source.raw_value(&self.raw_sensor_id)
    }

    pub fn state(&self, source: &dyn RawValueSource) -> Option<f64> {
        interpolate(self.raw_value(source), &self.table, self.method)
    }

    /// Replaces the table and persists it in the entry options.
    pub fn update_calibration(
        &mut self,
        table: CalibrationTable,
        store: &mut ConfigStore,
    ) -> Result<(), StoreError> {
        let mut options = store
            .entry(&self.entry_id)
            .map(|entry| entry.options.clone())
            .ok_or_else(|| StoreError::EntryNotFound(self.entry_id.clone()))?;

        options.insert(CONF_CALIBRATION.to_string(), json!(table.to_json()));
        store.update_options(&self.entry_id, options)?;

        info!(
            "Calibration of {} updated with {} points",
            self.entry_id,
            table.len()
        );
        self.table = table;
        Ok(())
    }
}

impl Sensor for CalibratedSensor {
    fn unique_id(&self) -> String {
        format!("{}_calibration_data", self.entry_id)
    }

    fn add_json_value(&self, source: &dyn RawValueSource, map: &mut Map<String, Value>) {
        map.insert(
            self.unique_id(),
            json!({
                "name": self.name(),
                "raw": self.raw_value(source),
                "calibrated": self.state(source),
                "unit": self.unit,
            }),
        );
    }

    fn pretty_print(&self, source: &dyn RawValueSource) -> String {
        let raw = self
            .raw_value(source)
            .map_or_else(|| "unknown".to_string(), |v| v.to_string());
        let calibrated = self
            .state(source)
            .map_or_else(|| "unknown".to_string(), |v| format!("{:.1}", v));

        format!(
            "{}: {} {} (raw {}, {})",
            self.name(),
            calibrated,
            self.unit,
            raw,
            self.method
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn entry(data: Value, options: Value) -> ConfigEntry {
        ConfigEntry {
            entry_id: "entry_1".to_string(),
            title: "Fresh water".to_string(),
            unique_id: None,
            data: data.as_object().cloned().unwrap_or_default(),
            options: options.as_object().cloned().unwrap_or_default(),
        }
    }

    fn states(raw: &str) -> HashMap<String, String> {
        let mut states = HashMap::new();
        states.insert("sensor.tank_raw".to_string(), raw.to_string());
        states
    }

    #[test]
    fn test_defaults() {
        let sensor = CalibratedSensor::from_entry(&entry(json!({}), json!({}))).unwrap();

        assert_eq!(sensor.name(), "Fresh water Calibrated Sensor");
        assert_eq!(sensor.unique_id(), "entry_1_calibration_data");
        assert_eq!(sensor.unit_of_measurement(), "Custom");
        assert_eq!(sensor.raw_sensor_id(), "sensor.raw_sensor_value");
        assert!(sensor.table().is_empty());
        assert_eq!(sensor.method(), InterpolationMethod::Linear);
    }

    #[test]
    fn test_state_follows_raw_sensor() {
        let sensor = CalibratedSensor::from_entry(&entry(
            json!({
                "raw_sensor_id": "sensor.tank_raw",
                "unit": "%",
                "calibration": "[[0,1],[2,20],[3,40]]",
            }),
            json!({}),
        ))
        .unwrap();

        assert_eq!(sensor.state(&states("1")), Some(10.5));
        assert_eq!(sensor.state(&states("-5")), Some(1.0));
        assert_eq!(sensor.state(&states("10")), Some(40.0));
        assert_eq!(sensor.state(&states("unknown")), None);
        assert_eq!(sensor.state(&HashMap::<String, String>::new()), None);
    }

    #[test]
    fn test_bad_calibration_is_identity() {
        let sensor = CalibratedSensor::from_entry(&entry(
            json!({"raw_sensor_id": "sensor.tank_raw", "calibration": "[[0,1],"}),
            json!({}),
        ))
        .unwrap();

        assert_eq!(sensor.state(&states("87.3")), Some(87.3));
    }

    #[test]
    fn test_options_override_data() {
        let sensor = CalibratedSensor::from_entry(&entry(
            json!({"raw_sensor_id": "sensor.tank_raw", "calibration": "[[0,0],[10,10]]"}),
            json!({"calibration": "[[0,0],[10,100]]", "interpolation": "previous"}),
        ))
        .unwrap();

        assert_eq!(sensor.method(), InterpolationMethod::Previous);
        assert_eq!(sensor.state(&states("5")), Some(0.0));
        assert_eq!(sensor.state(&states("10")), Some(100.0));
    }

    #[test]
    fn test_invalid_method_fails() {
        let result =
            CalibratedSensor::from_entry(&entry(json!({"interpolation": "quadratic"}), json!({})));
        assert_eq!(
            result.unwrap_err(),
            CalibrationError::InvalidMethod("quadratic".to_string())
        );
    }

    #[test]
    fn test_update_calibration_persists() {
        let mut store = ConfigStore::in_memory();
        let data = json!({"raw_sensor_id": "sensor.tank_raw"});
        let entry = store
            .add_entry(
                "Fresh water",
                None,
                data.as_object().cloned().unwrap_or_default(),
                Map::new(),
            )
            .unwrap()
            .clone();

        let mut sensor = CalibratedSensor::from_entry(&entry).unwrap();
        assert_eq!(sensor.state(&states("1")), Some(1.0));

        let table = CalibrationTable::parse("[[0,0],[2,50]]");
        sensor.update_calibration(table, &mut store).unwrap();
        assert_eq!(sensor.state(&states("1")), Some(25.0));

        let stored = store.entry("entry_1").unwrap();
        assert_eq!(stored.options["calibration"], json!("[[0.0,0.0],[2.0,50.0]]"));

        let reloaded = CalibratedSensor::from_entry(stored).unwrap();
        assert_eq!(reloaded.state(&states("1")), Some(25.0));
    }

    #[test]
    fn test_json_and_pretty_print() {
        let sensor = CalibratedSensor::from_entry(&entry(
            json!({
                "raw_sensor_id": "sensor.tank_raw",
                "unit": "%",
                "calibration": "[[0,0],[190,100]]",
            }),
            json!({}),
        ))
        .unwrap();
        let source = states("95");

        let mut map = Map::new();
        sensor.add_json_value(&source, &mut map);
        assert_eq!(
            map["entry_1_calibration_data"],
            json!({
                "name": "Fresh water Calibrated Sensor",
                "raw": 95.0,
                "calibrated": 50.0,
                "unit": "%",
            })
        );

        assert_eq!(
            sensor.pretty_print(&source),
            "Fresh water Calibrated Sensor: 50.0 % (raw 95, linear)"
        );
    }
}
