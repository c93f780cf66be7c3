//! Calibrated sensors for SmartVan.io devices.
//!
//! A raw reading (a tank sender resistance, an inclinometer angle) is mapped
//! through a user supplied calibration table. The configuration side mirrors
//! the setup wizard a home automation host runs for these devices.

pub mod configuration;
pub mod sensors;

pub use sensors::interpolator::{
    interpolate, CalibrationError, CalibrationPoint, CalibrationTable, InterpolationMethod,
};
