// ============================================================================
// COLOR CONVERSION: RGB → hex / HSL strings for picked pixels
// ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hue in degrees `[0, 360)`, saturation and lightness in percent `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hsl {
    pub h: u16,
    pub s: u8,
    pub l: u8,
}

impl fmt::Display for Hsl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hsl({}, {}%, {}%)", self.h, self.s, self.l)
    }
}

/// `#rrggbb`, lowercase.
pub fn to_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

/// Standard max/min/delta RGB → HSL, rounded to whole units.
pub fn to_hsl(r: u8, g: u8, b: u8) -> Hsl {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    let (h, s) = if max == min {
        (0.0, 0.0)
    } else {
        let d = max - min;
        let s = if l > 0.5 {
            d / (2.0 - max - min)
        } else {
            d / (max + min)
        };
        let h = if max == r {
            (g - b) / d + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / d + 2.0
        } else {
            (r - g) / d + 4.0
        };
        (h / 6.0, s)
    };

    // Rounding a hue just under one full turn lands on 360.
    let h = (h * 360.0).round() as u16 % 360;
    Hsl {
        h,
        s: (s * 100.0).round() as u8,
        l: (l * 100.0).round() as u8,
    }
}

/// `hsl(H, S%, L%)`
pub fn hsl_string(r: u8, g: u8, b: u8) -> String {
    to_hsl(r, g, b).to_string()
}

/// A single picked color in every format the picker displays.
///
/// Two samples are equal when their hex strings are equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorSample {
    pub hex: String,
    pub rgb: [u8; 3],
    pub hsl: Hsl,
}

impl PartialEq for ColorSample {
    fn eq(&self, other: &Self) -> bool {
        self.hex == other.hex
    }
}

impl Eq for ColorSample {}

impl ColorSample {
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            hex: to_hex(r, g, b),
            rgb: [r, g, b],
            hsl: to_hsl(r, g, b),
        }
    }

    /// Parse `#rrggbb` (case-insensitive). Shorthand and alpha forms are rejected.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let val = u32::from_str_radix(digits, 16).ok()?;
        let r = ((val >> 16) & 0xFF) as u8;
        let g = ((val >> 8) & 0xFF) as u8;
        let b = (val & 0xFF) as u8;
        Some(Self::from_rgb(r, g, b))
    }

    /// `rgb(r, g, b)`
    pub fn rgb_string(&self) -> String {
        let [r, g, b] = self.rgb;
        format!("rgb({}, {}, {})", r, g, b)
    }

    pub fn hsl_string(&self) -> String {
        self.hsl.to_string()
    }

    /// Whether the stored hex agrees with the stored channels. Records read back
    /// from storage are checked with this before they are trusted.
    pub fn is_consistent(&self) -> bool {
        let [r, g, b] = self.rgb;
        self.hex == to_hex(r, g, b)
    }
}

/// The three read-only fields shown for the current color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorField {
    Hex,
    Rgb,
    Hsl,
}

impl ColorField {
    pub const ALL: [ColorField; 3] = [ColorField::Hex, ColorField::Rgb, ColorField::Hsl];

    pub fn value(self, sample: &ColorSample) -> String {
        match self {
            ColorField::Hex => sample.hex.clone(),
            ColorField::Rgb => sample.rgb_string(),
            ColorField::Hsl => sample.hsl_string(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ColorField::Hex => "HEX",
            ColorField::Rgb => "RGB",
            ColorField::Hsl => "HSL",
        }
    }
}
