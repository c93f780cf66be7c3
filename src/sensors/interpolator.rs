use std::{cmp::Ordering, fmt, str::FromStr};

use log::warn;
use pad::{Alignment, PadStr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::spline::CubicSpline;

const COLUMN_WIDTH: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("Invalid interpolation method: {0}")]
    InvalidMethod(String),
}

/// One known `(raw, calibrated)` mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct CalibrationPoint {
    pub raw: f64,
    pub calibrated: f64,
}

impl CalibrationPoint {
    pub fn new(raw: f64, calibrated: f64) -> Self {
        Self { raw, calibrated }
    }

    fn is_finite(&self) -> bool {
        self.raw.is_finite() && self.calibrated.is_finite()
    }
}

impl From<[f64; 2]> for CalibrationPoint {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<CalibrationPoint> for [f64; 2] {
    fn from(point: CalibrationPoint) -> Self {
        [point.raw, point.calibrated]
    }
}

/// Calibration points, kept sorted by raw value with duplicate raw values removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationTable {
    points: Vec<CalibrationPoint>,
}

impl CalibrationTable {
    /// Builds a table from points in any order.
    ///
    /// Points with a non-finite coordinate are dropped. When several points
    /// share a raw value the first one given wins.
    pub fn new(points: impl IntoIterator<Item = CalibrationPoint>) -> Self {
        let mut points: Vec<CalibrationPoint> = points
            .into_iter()
            .filter(|p| {
                if !p.is_finite() {
                    warn!("Dropping non-finite calibration point {:?}", p);
                }
                p.is_finite()
            })
            .collect();

        // stable sort, so dedup keeps the first occurrence
        points.sort_by(|a, b| a.raw.total_cmp(&b.raw));
        points.dedup_by(|later, kept| later.raw == kept.raw);

        Self { points }
    }

    /// Parses the `[[raw, calibrated], ...]` form stored in config entries.
    ///
    /// A malformed string yields an empty table, which interpolates as identity.
    pub fn parse(s: &str) -> Self {
        match Self::try_parse(s) {
            Ok(table) => table,
            Err(e) => {
                warn!("Ignoring malformed calibration table {:?}: {}", s, e);
                Self::default()
            }
        }
    }

    /// Strict variant of [`CalibrationTable::parse`], for validating user input.
    pub fn try_parse(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Vec<CalibrationPoint>>(s).map(Self::new)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.points).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_sufficient(&self) -> bool {
        self.points.len() >= 2
    }

    /// Bounds of the calibrated values, `None` for an empty table.
    pub fn calibrated_range(&self) -> Option<(f64, f64)> {
        self.points.iter().fold(None, |range, p| match range {
            None => Some((p.calibrated, p.calibrated)),
            Some((lo, hi)) => Some((lo.min(p.calibrated), hi.max(p.calibrated))),
        })
    }
}

impl fmt::Display for CalibrationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}{}",
            "raw".pad(COLUMN_WIDTH, ' ', Alignment::Right, true),
            "calibrated".pad(COLUMN_WIDTH, ' ', Alignment::Right, true)
        )?;
        for p in &self.points {
            writeln!(
                f,
                "{}{}",
                p.raw
                    .to_string()
                    .pad(COLUMN_WIDTH, ' ', Alignment::Right, true),
                p.calibrated
                    .to_string()
                    .pad(COLUMN_WIDTH, ' ', Alignment::Right, true)
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InterpolationMethod {
    #[default]
    Linear,
    Nearest,
    Previous,
    Next,
    Cubic,
}

impl InterpolationMethod {
    pub const SUPPORTED: &'static [&'static str] =
        &["linear", "slinear", "nearest", "previous", "next", "cubic"];

    pub fn as_str(&self) -> &'static str {
        match self {
            InterpolationMethod::Linear => "linear",
            InterpolationMethod::Nearest => "nearest",
            InterpolationMethod::Previous => "previous",
            InterpolationMethod::Next => "next",
            InterpolationMethod::Cubic => "cubic",
        }
    }
}

impl FromStr for InterpolationMethod {
    type Err = CalibrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" | "slinear" => Ok(InterpolationMethod::Linear),
            "nearest" => Ok(InterpolationMethod::Nearest),
            "previous" => Ok(InterpolationMethod::Previous),
            "next" => Ok(InterpolationMethod::Next),
            "cubic" => Ok(InterpolationMethod::Cubic),
            _ => Err(CalibrationError::InvalidMethod(s.to_string())),
        }
    }
}

impl TryFrom<String> for InterpolationMethod {
    type Error = CalibrationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<InterpolationMethod> for String {
    fn from(method: InterpolationMethod) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a raw reading onto the calibration table.
///
/// A missing raw value gives `None`. A table with fewer than two points
/// returns the raw value untouched. Otherwise the interpolant is evaluated
/// (extrapolating outside the raw range), clamped to the calibrated range
/// and rounded to one decimal. Where the interpolant overflows into NaN the
/// nearest point's calibrated value is used.
pub fn interpolate(
    raw_value: Option<f64>,
    table: &CalibrationTable,
    method: InterpolationMethod,
) -> Option<f64> {
    let raw = raw_value.filter(|v| v.is_finite())?;

    if !table.is_sufficient() {
        return Some(raw);
    }

    let points = table.points();
    let y = match method {
        InterpolationMethod::Linear => linear(points, raw),
        InterpolationMethod::Nearest => nearest(points, raw),
        InterpolationMethod::Previous => previous(points, raw),
        InterpolationMethod::Next => next(points, raw),
        InterpolationMethod::Cubic => CubicSpline::new(points).evaluate(raw),
    };
    let y = if y.is_nan() { nearest(points, raw) } else { y };

    let (lo, hi) = table.calibrated_range()?;
    Some(round_one_decimal(y.clamp(lo, hi)))
}

/// `floor(10 * value + 0.5) / 10`
///
/// Magnitudes too large to scale have no fractional digits and are returned
/// unchanged.
pub fn round_one_decimal(value: f64) -> f64 {
    let scaled = 10.0 * value;
    if !scaled.is_finite() {
        return value;
    }
    (scaled + 0.5).floor() / 10.0
}

/// Index of the segment `[i, i + 1]` used for `x`; the first and last
/// segments also cover everything beyond the table.
fn segment(points: &[CalibrationPoint], x: f64) -> usize {
    let upper = points.partition_point(|p| p.raw <= x);
    upper.clamp(1, points.len() - 1) - 1
}

fn linear(points: &[CalibrationPoint], x: f64) -> f64 {
    let i = segment(points, x);
    let (p1, p2) = (points[i], points[i + 1]);
    // exact at both knots, finite for calibrated values up to f64::MAX
    let t = (x - p1.raw) / (p2.raw - p1.raw);
    p1.calibrated * (1.0 - t) + p2.calibrated * t
}

fn nearest(points: &[CalibrationPoint], x: f64) -> f64 {
    let i = segment(points, x);
    let (p1, p2) = (points[i], points[i + 1]);
    if x <= p1.raw {
        return p1.calibrated;
    }
    if x >= p2.raw {
        return p2.calibrated;
    }
    match (x - p1.raw).partial_cmp(&(p2.raw - x)) {
        Some(Ordering::Greater) => p2.calibrated,
        _ => p1.calibrated,
    }
}

fn previous(points: &[CalibrationPoint], x: f64) -> f64 {
    match points.partition_point(|p| p.raw <= x) {
        0 => points[0].calibrated,
        upper => points[upper - 1].calibrated,
    }
}

fn next(points: &[CalibrationPoint], x: f64) -> f64 {
    let lower = points.partition_point(|p| p.raw < x);
    points[lower.min(points.len() - 1)].calibrated
}
