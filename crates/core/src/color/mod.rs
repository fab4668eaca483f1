use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::VisualizerError;

/// 8-bit RGB color with a floating point alpha in `[0, 1]`.
///
/// Serialises as `#rrggbb`, or `#rrggbbaa` when the alpha is not opaque.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0.0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Returns the same color with a new alpha, clamped to `[0, 1]`.
    pub fn with_alpha(self, alpha: f32) -> Self {
        Self {
            a: alpha.clamp(0.0, 1.0),
            ..self
        }
    }

    /// Parses `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(value: &str) -> crate::Result<Self> {
        let digits = value.trim().trim_start_matches('#');
        if !digits.is_ascii() {
            return Err(VisualizerError::config(format!("invalid color `{value}`")));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| VisualizerError::config(format!("invalid color `{value}`")))
        };

        match digits.len() {
            3 => {
                let short = |index: usize| channel(index..index + 1).map(|v| v * 17);
                Ok(Self::rgb(short(0)?, short(1)?, short(2)?))
            }
            6 => Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
            8 => Ok(Self::rgba(
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                channel(6..8)? as f32 / 255.0,
            )),
            _ => Err(VisualizerError::config(format!("invalid color `{value}`"))),
        }
    }

    /// Linear RGB interpolation between two colors, truncating each channel.
    /// Channels are floored rather than rounded, so the black-to-white
    /// midpoint is 127.
    ///
    /// `t` is clamped to `[0, 1]`, so the endpoints are returned unchanged.
    pub fn lerp(self, other: Color, t: f32) -> Color {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let channel = |a: u8, b: u8| (a as f32 + t * (b as f32 - a as f32)).floor() as u8;
        Color {
            r: channel(self.r, other.r),
            g: channel(self.g, other.g),
            b: channel(self.b, other.b),
            a: self.a + t * (other.a - self.a),
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a < 1.0 {
            write!(f, "{:02x}", (self.a.clamp(0.0, 1.0) * 255.0).round() as u8)?;
        }
        Ok(())
    }
}

impl FromStr for Color {
    type Err = VisualizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Color {
    type Error = VisualizerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_string()
    }
}

/// Two-stop color ramp shared by every effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gradient {
    pub start: Color,
    pub end: Color,
}

impl Gradient {
    pub fn new(start: Color, end: Color) -> Self {
        Self { start, end }
    }

    pub fn color_at(&self, t: f32) -> Color {
        self.start.lerp(self.end, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_endpoints_are_exact() {
        let gradient = Gradient::new(Color::rgb(156, 39, 176), Color::rgb(63, 81, 181));
        assert_eq!(gradient.color_at(0.0), gradient.start);
        assert_eq!(gradient.color_at(1.0), gradient.end);
    }

    #[test]
    fn gradient_midpoint_is_channel_mean() {
        let gradient = Gradient::new(Color::rgb(0, 100, 40), Color::rgb(200, 50, 60));
        assert_eq!(gradient.color_at(0.5), Color::rgb(100, 75, 50));
    }

    #[test]
    fn odd_midpoints_truncate() {
        assert_eq!(Color::BLACK.lerp(Color::WHITE, 0.5), Color::rgb(127, 127, 127));
    }

    #[test]
    fn out_of_range_factors_clamp() {
        let gradient = Gradient::new(Color::BLACK, Color::WHITE);
        assert_eq!(gradient.color_at(-3.0), Color::BLACK);
        assert_eq!(gradient.color_at(7.0), Color::WHITE);
        assert_eq!(gradient.color_at(f32::NAN), Color::BLACK);
    }

    #[test]
    fn parses_and_prints_hex() {
        let color: Color = "#9c27b0".parse().unwrap();
        assert_eq!(color, Color::rgb(0x9c, 0x27, 0xb0));
        assert_eq!(color.to_string(), "#9c27b0");
        assert_eq!(Color::from_hex("#fff").unwrap(), Color::WHITE);

        let translucent = Color::from_hex("#00000080").unwrap();
        assert!((translucent.a - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(translucent.to_string(), "#00000080");
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(Color::from_hex("#12345").is_err());
        assert!(Color::from_hex("#zzzzzz").is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let json = serde_json::to_string(&Color::rgb(1, 2, 3)).unwrap();
        assert_eq!(json, "\"#010203\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Color::rgb(1, 2, 3));
    }
}
