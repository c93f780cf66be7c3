use serde_json::{Map, Value};

use super::raw_value::RawValueSource;

pub trait Sensor {
    fn unique_id(&self) -> String;
    fn add_json_value(&self, source: &dyn RawValueSource, map: &mut Map<String, Value>);
    fn pretty_print(&self, source: &dyn RawValueSource) -> String;
}
