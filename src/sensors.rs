use serde_json::{Map, Value};

use self::{raw_value::RawValueSource, sensor::Sensor};

pub mod calibrated_sensor;
pub mod esphome_sensor;
pub mod interpolator;
pub mod raw_value;
pub mod sensor;
pub mod spline;

/// The entities of every configured device.
#[derive(Default)]
pub struct Sensors {
    sensors: Vec<Box<dyn Sensor>>,
}

impl Sensors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sensor: impl Sensor + 'static) {
        self.sensors.push(Box::new(sensor));
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn to_json(&self, source: &dyn RawValueSource) -> Value {
        let mut map = Map::new();
        for sensor in &self.sensors {
            sensor.add_json_value(source, &mut map);
        }
        Value::Object(map)
    }

    pub fn pretty_print(&self, source: &dyn RawValueSource) -> String {
        self.sensors
            .iter()
            .map(|sensor| sensor.pretty_print(source))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::{esphome_sensor::EsphomeSensor, *};

    #[test]
    fn test_to_json_collects_every_sensor() {
        let mut sensors = Sensors::new();
        assert!(sensors.is_empty());
        sensors.add(EsphomeSensor::new("sensor.tank_1", "Tank 1", 0));
        sensors.add(EsphomeSensor::new("sensor.tank_2", "Tank 2", 1).with_unit("Ω"));
        assert_eq!(sensors.len(), 2);

        let mut states = HashMap::new();
        states.insert("sensor.tank_1".to_string(), "42.4".to_string());
        states.insert("sensor.tank_2".to_string(), "unknown".to_string());

        let json = sensors.to_json(&states);
        assert_eq!(json["sensor.tank_1"]["state"], json!("42"));
        assert_eq!(json["sensor.tank_2"]["state"], Value::Null);

        assert_eq!(
            sensors.pretty_print(&states),
            "Tank 1: 42\nTank 2: unknown Ω"
        );
    }
}
