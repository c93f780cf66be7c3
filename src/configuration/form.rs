use std::collections::BTreeMap;

use pad::{Alignment, PadStr};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::sensors::interpolator::{CalibrationTable, InterpolationMethod};

use super::{
    main_configuration::{MapFormElement, MapFormType, DEFAULT_CALIBRATION},
    post_data::PostData,
};

/// A form field with the value it is pre-filled with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormField {
    pub name: String,
    pub default: String,
}

/// Form errors keyed by field name, `base` for the whole form.
pub type FormErrors = BTreeMap<String, String>;

fn current_value<'a>(
    elem: &MapFormElement,
    current: &'a Map<String, Value>,
) -> Option<&'a Value> {
    let value = match elem.slot {
        Some(slot) => current.get(slot).and_then(|s| s.get(elem.key)),
        None => current.get(elem.key),
    };
    value.filter(|v| !v.is_null())
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn default_string(elem: &MapFormElement) -> String {
    match elem.data_type {
        MapFormType::String(default, _) => default.to_string(),
        MapFormType::Choice(default, _) => default.to_string(),
        MapFormType::Float(default) => default.to_string(),
        MapFormType::Bool(default) => default.to_string(),
        MapFormType::Calibration => DEFAULT_CALIBRATION.to_string(),
        MapFormType::Method(default) => default.to_string(),
    }
}

/// Fields of `map`, pre-filled from `current` or the element defaults.
pub fn render_fields(map: &[MapFormElement], current: &Map<String, Value>) -> Vec<FormField> {
    map.iter()
        .map(|elem| FormField {
            name: elem.form_name.to_string(),
            default: current_value(elem, current)
                .map(value_to_string)
                .unwrap_or_else(|| default_string(elem)),
        })
        .collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" | "" => Some(false),
        _ => None,
    }
}

fn convert(elem: &MapFormElement, raw: &str) -> Result<Value, &'static str> {
    match elem.data_type {
        MapFormType::String(_, max_len) => Ok(Value::String(
            raw.trim()
                .pad(max_len, ' ', Alignment::Left, true)
                .trim_end()
                .to_string(),
        )),
        MapFormType::Choice(_, allowed) => {
            let raw = raw.trim();
            if allowed.iter().any(|(key, _)| *key == raw) {
                Ok(Value::String(raw.to_string()))
            } else {
                Err("invalid_choice")
            }
        }
        MapFormType::Float(_) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Value::from)
            .ok_or("invalid_number"),
        MapFormType::Bool(_) => parse_bool(raw).map(Value::Bool).ok_or("invalid_boolean"),
        MapFormType::Calibration => CalibrationTable::try_parse(raw)
            .map(|table| Value::String(table.to_json()))
            .map_err(|_| "invalid_calibration"),
        MapFormType::Method(_) => raw
            .parse::<InterpolationMethod>()
            .map(|method| Value::String(method.as_str().to_string()))
            .map_err(|_| "invalid_method"),
    }
}

/// Validates a submitted form against `map`.
///
/// Fields left out of the submission keep their value from `current`, or
/// the element default. Slotted fields are grouped into one object per slot.
pub fn collect_form(
    map: &[MapFormElement],
    form: &PostData,
    current: &Map<String, Value>,
) -> Result<Map<String, Value>, FormErrors> {
    let mut collected = Map::new();
    let mut errors = FormErrors::new();

    for elem in map {
        let raw = form.read_value(elem.form_name).unwrap_or_else(|| {
            current_value(elem, current)
                .map(value_to_string)
                .unwrap_or_else(|| default_string(elem))
        });

        let value = match convert(elem, &raw) {
            Ok(value) => value,
            Err(error) => {
                errors.insert(elem.form_name.to_string(), error.to_string());
                continue;
            }
        };

        match elem.slot {
            Some(slot) => {
                let entry = collected
                    .entry(slot.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(obj) = entry {
                    obj.insert(elem.key.to_string(), value);
                }
            }
            None => {
                collected.insert(elem.key.to_string(), value);
            }
        }
    }

    if errors.is_empty() {
        Ok(collected)
    } else {
        Err(errors)
    }
}
