//! Colour tables keyed by theme.
//!
//! The day palette is authored directly; night and sepia are derived from it
//! by a per-theme tone mapping so every lookup stays consistent across themes.

use crate::rendering::color::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Day,
    Night,
    Sepia,
}

impl Theme {
    pub const ALL: [Theme; 3] = [Theme::Day, Theme::Night, Theme::Sepia];

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Day => "day",
            Theme::Night => "night",
            Theme::Sepia => "sepia",
        }
    }

    /// Maps a day colour into this theme
    pub fn tone(&self, color: Color) -> Color {
        match self {
            Theme::Day => color,
            Theme::Night => {
                let alpha = color.a;
                color
                    .darken(0.62)
                    .mix(&Color::rgb(24, 32, 58), 0.25)
                    .with_alpha(alpha)
            }
            Theme::Sepia => {
                let (r, g, b) = (color.r as f64, color.g as f64, color.b as f64);
                let channel = |v: f64| v.round().clamp(0.0, 255.0) as u8;
                Color::rgba(
                    channel(0.393 * r + 0.769 * g + 0.189 * b),
                    channel(0.349 * r + 0.686 * g + 0.168 * b),
                    channel(0.272 * r + 0.534 * g + 0.131 * b),
                    color.a,
                )
            }
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Theme::ALL
            .into_iter()
            .find(|theme| theme.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown theme '{s}' (expected day, night or sepia)"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub theme: Theme,
    pub background: Color,
    pub water: Color,
    pub water_line: Color,
    pub park: Color,
    pub forest: Color,
    pub grass: Color,
    pub tree: Color,
    pub shadow: Color,
    pub road_casing: Color,
    pub poi_label: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        let tone = |color: Color| theme.tone(color);
        Self {
            theme,
            background: tone(Color::rgb(242, 239, 233)),
            water: tone(Color::rgb(170, 211, 223)),
            water_line: tone(Color::rgb(120, 180, 205)),
            park: tone(Color::rgb(200, 230, 180)),
            forest: tone(Color::rgb(157, 202, 138)),
            grass: tone(Color::rgb(214, 237, 190)),
            tree: tone(Color::rgb(98, 160, 92)),
            // Shadows stay neutral in every theme
            shadow: Color::rgba(0, 0, 0, if theme == Theme::Night { 110 } else { 64 }),
            road_casing: tone(Color::rgb(160, 150, 140)),
            poi_label: tone(Color::rgb(60, 60, 70)),
        }
    }

    /// Wall and roof colour for a building type
    pub fn building_colors(&self, building_type: &str) -> (Color, Color) {
        let (wall, roof) = match building_type {
            "commercial" | "office" | "retail" => ((196, 203, 214), (170, 178, 192)),
            "industrial" | "warehouse" | "manufacture" => ((205, 192, 178), (182, 168, 152)),
            "church" | "cathedral" | "chapel" | "mosque" | "temple" | "synagogue" => {
                ((222, 205, 180), (176, 132, 108))
            }
            "hospital" | "university" | "school" | "college" | "kindergarten" => {
                ((230, 214, 206), (200, 176, 168))
            }
            "public" | "civic" | "government" | "train_station" | "transportation" => {
                ((214, 206, 226), (186, 176, 204))
            }
            "stadium" => ((208, 214, 200), (180, 190, 170)),
            "garage" | "garages" | "shed" | "roof" | "carport" => ((210, 206, 200), (188, 184, 178)),
            _ => ((226, 218, 206), (204, 190, 176)),
        };
        (
            self.theme.tone(Color::rgb(wall.0, wall.1, wall.2)),
            self.theme.tone(Color::rgb(roof.0, roof.1, roof.2)),
        )
    }

    pub fn road_color(&self, highway: &str) -> Color {
        let rgb = match highway.trim_end_matches("_link") {
            "motorway" => (233, 144, 160),
            "trunk" => (249, 178, 156),
            "primary" => (252, 214, 164),
            "secondary" => (247, 250, 191),
            "tertiary" | "residential" | "unclassified" | "living_street" => (255, 255, 255),
            "service" => (245, 245, 245),
            "pedestrian" => (221, 221, 232),
            "footway" | "path" => (250, 128, 114),
            "cycleway" => (100, 120, 250),
            _ => (240, 240, 240),
        };
        self.theme.tone(Color::rgb(rgb.0, rgb.1, rgb.2))
    }

    pub fn park_color(&self, park_type: &str) -> Color {
        match park_type {
            "forest" | "wood" => self.forest,
            "grass" | "meadow" | "village_green" | "recreation_ground" => self.grass,
            _ => self.park,
        }
    }

    pub fn poi_color(&self, poi_type: &str) -> Color {
        let rgb = match poi_type {
            "restaurant" | "cafe" | "bar" | "pub" | "fast_food" => (224, 120, 60),
            "hospital" | "pharmacy" => (210, 60, 60),
            "school" | "university" | "library" => (150, 110, 60),
            "museum" | "gallery" | "attraction" | "artwork" | "viewpoint" | "theatre" => {
                (170, 80, 170)
            }
            "hotel" => (40, 110, 190),
            "place_of_worship" => (90, 90, 90),
            "bank" | "post_office" | "townhall" => (110, 110, 150),
            "stadium" | "sports_centre" | "swimming_pool" | "marina" | "zoo" | "theme_park" => {
                (60, 150, 90)
            }
            _ => (120, 120, 120),
        };
        self.theme.tone(Color::rgb(rgb.0, rgb.1, rgb.2))
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::for_theme(Theme::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn luminance(c: Color) -> f64 {
        0.2126 * c.r as f64 + 0.7152 * c.g as f64 + 0.0722 * c.b as f64
    }

    #[test]
    fn test_theme_parsing() {
        assert_eq!("Night".parse::<Theme>(), Ok(Theme::Night));
        assert_eq!(" sepia ".parse::<Theme>(), Ok(Theme::Sepia));
        assert!("neon".parse::<Theme>().is_err());
        assert_eq!(Theme::default(), Theme::Day);
    }

    #[test]
    fn test_night_is_darker() {
        let day = Palette::for_theme(Theme::Day);
        let night = Palette::for_theme(Theme::Night);
        assert!(luminance(night.background) < luminance(day.background));
        let (day_wall, _) = day.building_colors("office");
        let (night_wall, _) = night.building_colors("office");
        assert!(luminance(night_wall) < luminance(day_wall));
    }

    #[test]
    fn test_sepia_is_warm() {
        let water = Palette::for_theme(Theme::Sepia).water;
        assert!(water.r >= water.g && water.g >= water.b);
    }

    #[test]
    fn test_type_lookups() {
        let palette = Palette::default();
        assert_ne!(palette.road_color("motorway"), palette.road_color("residential"));
        assert_eq!(palette.road_color("primary_link"), palette.road_color("primary"));
        assert_eq!(palette.park_color("wood"), palette.forest);
        let (church_wall, church_roof) = palette.building_colors("church");
        assert_ne!(church_wall, church_roof);
    }
}
