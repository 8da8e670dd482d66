//! Typed request options.
//!
//! The marshalling layer hands over loosely typed option bags. These
//! structs deserialize them with their camelCase wire names and defaults,
//! and normalize them (clamped tolerances, optional region) before anything
//! enters the pipeline.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::compare::Tolerances;
use crate::diff::DiffMode;
use crate::naming::DEFAULT_FILE_NAME;
use crate::region::CaptureRegion;

/// Options of a capture request.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureOptions {
    #[serde(deserialize_with = "lenient::file_name")]
    pub file_name: String,
    #[serde(deserialize_with = "lenient::int")]
    pub x: i32,
    #[serde(deserialize_with = "lenient::int")]
    pub y: i32,
    #[serde(deserialize_with = "lenient::int")]
    pub width: i32,
    #[serde(deserialize_with = "lenient::int")]
    pub height: i32,
    /// Send a provisional "capture taken" reply as soon as the snapshot
    /// exists, before any file I/O or comparison.
    #[serde(deserialize_with = "lenient::flag")]
    pub asynchronous: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_FILE_NAME.to_string(),
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            asynchronous: false,
        }
    }
}

impl CaptureOptions {
    pub fn named(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Self::default()
        }
    }

    pub fn with_region(mut self, region: CaptureRegion) -> Self {
        self.x = region.x;
        self.y = region.y;
        self.width = region.width;
        self.height = region.height;
        self
    }

    pub fn asynchronous(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }

    /// The rectangle as sent. The origin is kept even when the size is
    /// zero, since a comparison without a sub-rect still reads from it.
    pub fn region(&self) -> Option<CaptureRegion> {
        let region = CaptureRegion::new(self.x, self.y, self.width, self.height);
        (region != CaptureRegion::default()).then_some(region)
    }
}

/// Options of a capture-and-compare request.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompareOptions {
    /// Asset name or filesystem path of the baseline image.
    #[serde(rename = "compareURL", deserialize_with = "lenient::text")]
    pub compare_url: String,
    #[serde(deserialize_with = "lenient::flag")]
    pub write_actual_to_file: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub write_diff_to_file: bool,
    #[serde(deserialize_with = "lenient::fraction")]
    pub color_tolerance: f64,
    #[serde(deserialize_with = "lenient::fraction")]
    pub pixel_tolerance: f64,
    #[serde(deserialize_with = "lenient::flag")]
    pub binary_diff: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            compare_url: String::new(),
            write_actual_to_file: false,
            write_diff_to_file: false,
            color_tolerance: 0.0,
            pixel_tolerance: 0.0,
            binary_diff: false,
        }
    }
}

impl CompareOptions {
    pub fn new(compare_url: impl Into<String>) -> Self {
        Self {
            compare_url: compare_url.into(),
            ..Self::default()
        }
    }

    pub fn write_actual(mut self, enabled: bool) -> Self {
        self.write_actual_to_file = enabled;
        self
    }

    pub fn write_diff(mut self, enabled: bool) -> Self {
        self.write_diff_to_file = enabled;
        self
    }

    pub fn tolerances(mut self, color: f64, pixel: f64) -> Self {
        self.color_tolerance = color;
        self.pixel_tolerance = pixel;
        self
    }

    pub fn binary(mut self, enabled: bool) -> Self {
        self.binary_diff = enabled;
        self
    }

    pub fn to_tolerances(&self) -> Tolerances {
        Tolerances::new(self.color_tolerance, self.pixel_tolerance)
    }

    pub fn diff_mode(&self) -> DiffMode {
        DiffMode::from_binary_flag(self.binary_diff)
    }
}

/// Normalized compare settings handed to the worker stage.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CompareRequest {
    pub baseline: String,
    pub write_actual: bool,
    pub write_diff: bool,
    pub tolerances: Tolerances,
    pub mode: DiffMode,
}

impl From<CompareOptions> for CompareRequest {
    fn from(options: CompareOptions) -> Self {
        Self {
            tolerances: options.to_tolerances(),
            mode: options.diff_mode(),
            write_actual: options.write_actual_to_file,
            write_diff: options.write_diff_to_file,
            baseline: options.compare_url,
        }
    }
}

/// Field deserializers that never reject a request. A value of the wrong
/// type, a null, or an out-of-range number falls back to the field default.
/// Strings holding a number or boolean are read as one.
mod lenient {
    use super::*;

    pub(super) fn file_name<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
        Ok(scalar_text(Value::deserialize(de)?).unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()))
    }

    pub(super) fn text<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
        Ok(scalar_text(Value::deserialize(de)?).unwrap_or_default())
    }

    pub(super) fn int<'de, D: Deserializer<'de>>(de: D) -> Result<i32, D::Error> {
        let value = Value::deserialize(de)?;
        let number = match &value {
            Value::Number(n) => n.as_i64().map(|v| v as f64).or_else(|| n.as_f64()),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        Ok(number
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .filter(|v| (i32::MIN as f64..=i32::MAX as f64).contains(v))
            .map_or(0, |v| v as i32))
    }

    pub(super) fn fraction<'de, D: Deserializer<'de>>(de: D) -> Result<f64, D::Error> {
        let value = Value::deserialize(de)?;
        let number = match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        Ok(number.unwrap_or(0.0))
    }

    pub(super) fn flag<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(de)? {
            Value::Bool(b) => b,
            Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        })
    }

    fn scalar_text(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}
