use serde::{Deserialize, Serialize};
use std::fmt;

/// 8-bit RGBA colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parses `#rgb`, `#rrggbb`, `#rrggbbaa` (leading `#` optional) or a
    /// handful of CSS colour names as found in OSM `*:colour` tags
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Some(named) = named_color(&value.to_ascii_lowercase()) {
            return Some(named);
        }
        let hex = value.strip_prefix('#').unwrap_or(value);
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let mut chars = hex.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
                Some(Self::rgb(chars.next()??, chars.next()??, chars.next()??))
            }
            6 => Some(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            8 => Some(Self::rgba(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                channel(&hex[6..8])?,
            )),
            _ => None,
        }
    }

    /// Linear blend toward `other`; `t` is clamped to [0, 1]
    pub fn mix(&self, other: &Color, t: f64) -> Color {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Color::rgba(
            lerp(self.r, other.r),
            lerp(self.g, other.g),
            lerp(self.b, other.b),
            lerp(self.a, other.a),
        )
    }

    pub fn lighten(&self, amount: f64) -> Color {
        let alpha = self.a;
        self.mix(&Color::WHITE, amount).with_alpha(alpha)
    }

    pub fn darken(&self, amount: f64) -> Color {
        let alpha = self.a;
        self.mix(&Color::BLACK, amount).with_alpha(alpha)
    }

    /// Brightens for positive `factor`, darkens for negative, by at most `strength`
    pub fn shade(&self, factor: f64, strength: f64) -> Color {
        let amount = factor.clamp(-1.0, 1.0) * strength;
        if amount >= 0.0 {
            self.lighten(amount)
        } else {
            self.darken(-amount)
        }
    }

    pub fn with_alpha(&self, a: u8) -> Color {
        Color { a, ..*self }
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn named_color(name: &str) -> Option<Color> {
    let color = match name {
        "white" => Color::WHITE,
        "black" => Color::BLACK,
        "grey" | "gray" => Color::rgb(128, 128, 128),
        "silver" => Color::rgb(192, 192, 192),
        "red" => Color::rgb(200, 40, 40),
        "maroon" => Color::rgb(128, 0, 0),
        "brown" => Color::rgb(140, 90, 60),
        "orange" => Color::rgb(230, 140, 50),
        "yellow" => Color::rgb(235, 215, 80),
        "beige" => Color::rgb(230, 220, 190),
        "tan" => Color::rgb(210, 180, 140),
        "green" => Color::rgb(60, 140, 60),
        "blue" => Color::rgb(50, 90, 180),
        "pink" => Color::rgb(240, 170, 190),
        _ => return None,
    };
    Some(color)
}
