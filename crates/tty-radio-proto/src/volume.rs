//! Decoder volume.
//!
//! The decoder takes an output scale factor, so volume is an integer in
//! `0..=32000` everywhere on the wire and in the config file.  The CLI also
//! accepts floats (`0.0..=1.0`) and percentages, see [`parse_volume`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MAX_VOLUME: u16 = 32000;
pub const DEFAULT_VOLUME: u16 = 11000;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum VolumeError {
    #[error("volume {0} is out of range (0..{MAX_VOLUME})")]
    OutOfRange(i64),
    #[error("invalid volume value: {0}")]
    Invalid(String),
    #[error("unknown volume format '{0}' (expected float, int or percent)")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Volume(u16);

impl Volume {
    pub fn new(value: i64) -> Result<Self, VolumeError> {
        if (0..=i64::from(MAX_VOLUME)).contains(&value) {
            Ok(Self(value as u16))
        } else {
            Err(VolumeError::OutOfRange(value))
        }
    }

    pub fn get(self) -> u16 {
        self.0
    }

    pub fn as_fraction(self) -> f64 {
        f64::from(self.0) / f64::from(MAX_VOLUME)
    }

    pub fn as_percent(self) -> u16 {
        self.0 / 320
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self(DEFAULT_VOLUME)
    }
}

impl TryFrom<i64> for Volume {
    type Error = VolumeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Volume> for i64 {
    fn from(v: Volume) -> Self {
        i64::from(v.0)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a volume is written by the user or printed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeFormat {
    Float,
    Int,
    Percent,
}

impl FromStr for VolumeFormat {
    type Err = VolumeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "float" => Ok(Self::Float),
            "int" => Ok(Self::Int),
            "percent" => Ok(Self::Percent),
            other => Err(VolumeError::UnknownFormat(other.to_string())),
        }
    }
}

/// Guess the format of a raw value: a trailing `%` or anything in `1..=100`
/// is a percentage, `0.0..=1.0` is a float, everything else is a raw integer.
pub fn detect_format(raw: &str) -> Result<VolumeFormat, VolumeError> {
    let raw = raw.trim();
    if raw.ends_with('%') {
        return Ok(VolumeFormat::Percent);
    }
    let value: f64 = raw
        .parse()
        .map_err(|_| VolumeError::Invalid(raw.to_string()))?;
    if (0.0..=1.0).contains(&value) {
        Ok(VolumeFormat::Float)
    } else if (0.0..=100.0).contains(&value) {
        Ok(VolumeFormat::Percent)
    } else {
        Ok(VolumeFormat::Int)
    }
}

/// Parse a user-supplied volume.  With `format == None` the format is
/// auto-detected via [`detect_format`].
pub fn parse_volume(raw: &str, format: Option<VolumeFormat>) -> Result<Volume, VolumeError> {
    let format = match format {
        Some(f) => f,
        None => detect_format(raw)?,
    };
    let trimmed = raw.trim();
    let invalid = || VolumeError::Invalid(trimmed.to_string());
    let value = match format {
        VolumeFormat::Float => {
            let f: f64 = trimmed.parse().map_err(|_| invalid())?;
            (f * f64::from(MAX_VOLUME)) as i64
        }
        VolumeFormat::Percent => {
            let f: f64 = trimmed
                .trim_end_matches('%')
                .parse()
                .map_err(|_| invalid())?;
            (f * 320.0) as i64
        }
        VolumeFormat::Int => trimmed.parse::<i64>().map_err(|_| invalid())?,
    };
    Volume::new(value)
}

/// Render a volume.  Without a format all three representations are shown.
pub fn format_volume(volume: Volume, format: Option<VolumeFormat>) -> String {
    let int_str = volume.get().to_string();
    let float_str = format!("{}", volume.as_fraction());
    let percent_str = format!("{}%", volume.as_percent());
    match format {
        Some(VolumeFormat::Int) => int_str,
        Some(VolumeFormat::Float) => float_str,
        Some(VolumeFormat::Percent) => percent_str,
        None => format!("{} / {} / {}", int_str, float_str, percent_str),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_bounds() {
        assert_eq!(Volume::new(0).unwrap().get(), 0);
        assert_eq!(Volume::new(32000).unwrap().get(), 32000);
        assert_eq!(Volume::new(32001), Err(VolumeError::OutOfRange(32001)));
        assert_eq!(Volume::new(-1), Err(VolumeError::OutOfRange(-1)));
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format("50%").unwrap(), VolumeFormat::Percent);
        assert_eq!(detect_format("0.5").unwrap(), VolumeFormat::Float);
        assert_eq!(detect_format("1").unwrap(), VolumeFormat::Float);
        assert_eq!(detect_format("42").unwrap(), VolumeFormat::Percent);
        assert_eq!(detect_format("11000").unwrap(), VolumeFormat::Int);
        assert!(detect_format("loud").is_err());
    }

    #[test]
    fn test_parse_volume_formats() {
        assert_eq!(parse_volume("0.5", None).unwrap().get(), 16000);
        assert_eq!(parse_volume("50%", None).unwrap().get(), 16000);
        assert_eq!(parse_volume("50", None).unwrap().get(), 16000);
        assert_eq!(parse_volume("11000", None).unwrap().get(), 11000);
        assert_eq!(
            parse_volume("50", Some(VolumeFormat::Int)).unwrap().get(),
            50
        );
        assert!(matches!(
            parse_volume("40000", None),
            Err(VolumeError::OutOfRange(40000))
        ));
    }

    #[test]
    fn test_format_volume() {
        let v = Volume::new(16000).unwrap();
        assert_eq!(format_volume(v, Some(VolumeFormat::Int)), "16000");
        assert_eq!(format_volume(v, Some(VolumeFormat::Float)), "0.5");
        assert_eq!(format_volume(v, Some(VolumeFormat::Percent)), "50%");
        assert_eq!(format_volume(v, None), "16000 / 0.5 / 50%");
    }

    #[test]
    fn test_serde_rejects_out_of_range() {
        let ok: Volume = serde_json::from_str("32000").unwrap();
        assert_eq!(ok.get(), 32000);
        assert!(serde_json::from_str::<Volume>("32001").is_err());
        assert_eq!(serde_json::to_string(&ok).unwrap(), "32000");
    }
}
