// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// Color type for visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    /// Red color.
    pub const RED: Color = Color(255, 0, 0);
    /// Lime color, `#00ff00`.
    pub const LIME: Color = Color(0, 255, 0);
    /// Blue color.
    pub const BLUE: Color = Color(0, 0, 255);
    /// White color.
    pub const WHITE: Color = Color(255, 255, 255);
    /// Black color.
    pub const BLACK: Color = Color(0, 0, 0);

    /// Create a new color from RGB values.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self(r, g, b)
    }

    /// Channels as an array, in `image::Rgb` order.
    pub const fn to_array(self) -> [u8; 3] {
        [self.0, self.1, self.2]
    }
}

impl std::str::FromStr for Color {
    type Err = String;

    /// Parse a CSS-style name (`lime`, `red`, ...) or a `#rrggbb` hex string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "red" => return Ok(Self::RED),
            "lime" | "green" => return Ok(Self::LIME),
            "blue" => return Ok(Self::BLUE),
            "white" => return Ok(Self::WHITE),
            "black" => return Ok(Self::BLACK),
            _ => {}
        }
        let hex = s
            .strip_prefix('#')
            .filter(|h| h.len() == 6)
            .ok_or_else(|| format!("invalid color '{s}'"))?;
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| format!("invalid color '{s}'"))
        };
        Ok(Self(channel(0)?, channel(2)?, channel(4)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_and_hex() {
        assert_eq!("lime".parse::<Color>().unwrap(), Color::LIME);
        assert_eq!("RED".parse::<Color>().unwrap(), Color::RED);
        assert_eq!("#042aff".parse::<Color>().unwrap(), Color(4, 42, 255));
        assert!("#12".parse::<Color>().is_err());
        assert!("chartreuse".parse::<Color>().is_err());
    }
}
