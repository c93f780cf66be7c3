pub const DOMAIN: &str = "smartvanio";

pub const CONF_HOST: &str = "host";
pub const CONF_PORT: &str = "port";
pub const CONF_PASSWORD: &str = "password";
pub const CONF_NOISE_PSK: &str = "noise_psk";
pub const CONF_DEVICE_NAME: &str = "device_name";
pub const CONF_ALLOW_SERVICE_CALLS: &str = "allow_service_calls";

pub const CONF_DEVICE: &str = "device";
pub const CONF_DEVICE_TYPE: &str = "device_type";
pub const CONF_DEVICE_INFO: &str = "device_info";
pub const CONF_NAME: &str = "name";
pub const CONF_RAW_SENSOR_ID: &str = "raw_sensor_id";
pub const CONF_CALIBRATION: &str = "calibration";
pub const CONF_INTERPOLATION: &str = "interpolation";
pub const CONF_UNIT: &str = "unit";

pub const DEFAULT_PORT: u16 = 6053;
pub const DEFAULT_ALLOW_SERVICE_CALLS: bool = true;
pub const DEFAULT_NEW_CONFIG_ALLOW_SERVICE_CALLS: bool = false;
pub const DEFAULT_RAW_SENSOR_ID: &str = "sensor.raw_sensor_value";
pub const DEFAULT_CALIBRATION: &str = "[]";
pub const DEFAULT_UNIT: &str = "Custom";

pub const PROJECT_RESISTIVE_SENSOR: &str = "smartvanio.resistive_sensor";
pub const PROJECT_INCLINOMETER: &str = "smartvanio.inclinometer";

pub const SMARTVANIO_URL: &str = "https://www.smartvan.io";

pub const MAX_NAME_LEN: usize = 32;

pub const SENSOR_TYPES: &[(&str, &str)] = &[
    ("water_tank", "Water Tank Level"),
    ("temperature", "Temperature Sensor"),
    ("proximity", "Proximity Sensor (On/Off)"),
    ("fuel_tank", "Fuel Tank Level"),
    ("custom", "Custom Sensor (User Defined)"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    ResistiveSensor,
    Inclinometer,
    Other,
}

impl DeviceType {
    pub fn from_project_name(project_name: &str) -> Self {
        match project_name {
            PROJECT_RESISTIVE_SENSOR => DeviceType::ResistiveSensor,
            PROJECT_INCLINOMETER => DeviceType::Inclinometer,
            _ => DeviceType::Other,
        }
    }
}

#[derive(Debug)]
pub enum MapFormType {
    /// default, max length
    String(&'static str, usize),
    /// default, allowed keys
    Choice(&'static str, &'static [(&'static str, &'static str)]),
    Float(f64),
    Bool(bool),
    Calibration,
    Method(&'static str),
}

#[derive(Debug)]
pub struct MapFormElement {
    /// Sub-object of the entry the value is stored in, if any.
    pub slot: Option<&'static str>,
    pub key: &'static str,
    pub form_name: &'static str,
    pub data_type: MapFormType,
}

pub const MAP_USER_FORM: &[MapFormElement] = &[MapFormElement {
    slot: None,
    key: CONF_HOST,
    form_name: CONF_HOST,
    data_type: MapFormType::String("", 128),
}];

pub const MAP_INCLINOMETER_FORM: &[MapFormElement] = &[MapFormElement {
    slot: None,
    key: CONF_NAME,
    form_name: "inclinometer_name",
    data_type: MapFormType::String("Inclinometer", MAX_NAME_LEN),
}];

macro_rules! resistive_form {
    ($($slot:literal => $default_name:literal),*) => {
        &[$(
            MapFormElement {
                slot: Some($slot),
                key: "name",
                form_name: concat!($slot, "_name"),
                data_type: MapFormType::String($default_name, MAX_NAME_LEN),
            },
            MapFormElement {
                slot: Some($slot),
                key: "type",
                form_name: concat!($slot, "_type"),
                data_type: MapFormType::Choice("water_tank", SENSOR_TYPES),
            },
            MapFormElement {
                slot: Some($slot),
                key: "min_resistance",
                form_name: concat!($slot, "_min_resistance"),
                data_type: MapFormType::Float(0.0),
            },
            MapFormElement {
                slot: Some($slot),
                key: "max_resistance",
                form_name: concat!($slot, "_max_resistance"),
                data_type: MapFormType::Float(190.0),
            },
        )*]
    };
}

pub const MAP_RESISTIVE_FORM: &[MapFormElement] =
    resistive_form!("sensor_1" => "Sensor 1", "sensor_2" => "Sensor 2");

/// Extra fields offered when revising a resistive sensor after setup.
pub const MAP_CALIBRATION_FORM: &[MapFormElement] = &[
    MapFormElement {
        slot: None,
        key: CONF_CALIBRATION,
        form_name: CONF_CALIBRATION,
        data_type: MapFormType::Calibration,
    },
    MapFormElement {
        slot: None,
        key: CONF_INTERPOLATION,
        form_name: CONF_INTERPOLATION,
        data_type: MapFormType::Method("linear"),
    },
];

pub const MAP_SERVICE_CALLS_FORM: &[MapFormElement] = &[MapFormElement {
    slot: None,
    key: CONF_ALLOW_SERVICE_CALLS,
    form_name: CONF_ALLOW_SERVICE_CALLS,
    data_type: MapFormType::Bool(DEFAULT_ALLOW_SERVICE_CALLS),
}];
