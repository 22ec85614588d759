use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
///
/// Used for delta time (seconds), transport progress, extraction timers,
/// power figures and satisfaction ratios.
pub type Fixed64 = I32F32;

/// Ticks are the count of `World::tick` calls since creation or load.
pub type Ticks = u64;

/// Convert an f64 to Fixed64. Use only at the config/save/driver boundary.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::saturating_from_num(v)
}

/// Convert Fixed64 to f64. Use only for persistence and display.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Convert a whole count into Fixed64, saturating above `i32::MAX`.
#[inline]
pub fn from_count(n: u32) -> Fixed64 {
    Fixed64::saturating_from_num(n)
}

/// Checked division that returns None on a zero divisor or overflow.
#[inline]
pub fn checked_div_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_div(b)
}

/// Clamp a value into the unit interval `[0, 1]`.
#[inline]
pub fn clamp_unit(v: Fixed64) -> Fixed64 {
    v.clamp(Fixed64::ZERO, Fixed64::ONE)
}

/// Serde adapter that stores a [`Fixed64`] as a plain JSON/RON/TOML number.
///
/// Usage: `#[serde(with = "gridforge_core::fixed::as_f64")]`.
pub mod as_f64 {
    use super::{Fixed64, fixed64_to_f64};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Fixed64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(fixed64_to_f64(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Fixed64, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        Fixed64::checked_from_num(raw)
            .ok_or_else(|| D::Error::custom(format!("{raw} is out of fixed-point range")))
    }
}
