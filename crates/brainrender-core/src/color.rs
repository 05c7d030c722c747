//! Colour specifications and their conversion to linear rgb triples.

use glam::Vec3;

use crate::error::{BrainrenderError, Result};

/// Anything accepted where a colour is expected.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorLike {
    /// A colour name (`"salmon"`) or hex string (`"#fa8072"`, `"#f80"`).
    Name(String),
    /// Floating point rgb in `[0, 1]`, or `[0, 255]` if any channel exceeds 1.
    Rgb([f32; 3]),
    /// 8-bit rgb.
    Rgb8([u8; 3]),
    /// Index into the default palette, wrapping around.
    Index(usize),
}

impl From<&str> for ColorLike {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<String> for ColorLike {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl From<[f32; 3]> for ColorLike {
    fn from(value: [f32; 3]) -> Self {
        Self::Rgb(value)
    }
}

impl From<Vec3> for ColorLike {
    fn from(value: Vec3) -> Self {
        Self::Rgb(value.to_array())
    }
}

impl From<[u8; 3]> for ColorLike {
    fn from(value: [u8; 3]) -> Self {
        Self::Rgb8(value)
    }
}

impl From<usize> for ColorLike {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

/// Palette used for integer colour indices.
pub const PALETTE: [[u8; 3]; 10] = [
    [31, 119, 180],
    [255, 127, 14],
    [44, 160, 44],
    [214, 39, 40],
    [148, 103, 189],
    [140, 86, 75],
    [227, 119, 194],
    [127, 127, 127],
    [188, 189, 34],
    [23, 190, 207],
];

const NAMED: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("green", [0, 128, 0]),
    ("lime", [0, 255, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("orange", [255, 165, 0]),
    ("orangered", [255, 69, 0]),
    ("purple", [128, 0, 128]),
    ("pink", [255, 192, 203]),
    ("brown", [165, 42, 42]),
    ("gold", [255, 215, 0]),
    ("silver", [192, 192, 192]),
    ("grey", [128, 128, 128]),
    ("gray", [128, 128, 128]),
    ("lightgrey", [211, 211, 211]),
    ("lightgray", [211, 211, 211]),
    ("darkgrey", [169, 169, 169]),
    ("darkgray", [169, 169, 169]),
    ("dimgray", [105, 105, 105]),
    ("navy", [0, 0, 128]),
    ("teal", [0, 128, 128]),
    ("olive", [128, 128, 0]),
    ("maroon", [128, 0, 0]),
    ("coral", [255, 127, 80]),
    ("tomato", [255, 99, 71]),
    ("salmon", [250, 128, 114]),
    ("skyblue", [135, 206, 235]),
    ("steelblue", [70, 130, 180]),
    ("lightblue", [173, 216, 230]),
    ("darkblue", [0, 0, 139]),
    ("darkred", [139, 0, 0]),
    ("darkgreen", [0, 100, 0]),
    ("darkseagreen", [143, 188, 143]),
    ("seagreen", [46, 139, 87]),
    ("lightseagreen", [32, 178, 170]),
    ("plum", [221, 160, 221]),
    ("orchid", [218, 112, 214]),
    ("violet", [238, 130, 238]),
    ("indigo", [75, 0, 130]),
    ("khaki", [240, 230, 140]),
    ("beige", [245, 245, 220]),
    ("ivory", [255, 255, 240]),
    ("crimson", [220, 20, 60]),
    ("firebrick", [178, 34, 34]),
    ("turquoise", [64, 224, 208]),
    ("chocolate", [210, 105, 30]),
];

fn from_u8(rgb: [u8; 3]) -> Vec3 {
    Vec3::new(
        f32::from(rgb[0]) / 255.0,
        f32::from(rgb[1]) / 255.0,
        f32::from(rgb[2]) / 255.0,
    )
}

fn parse_hex(hex: &str) -> Option<Vec3> {
    let digits: Vec<u8> = hex
        .chars()
        .map(|c| c.to_digit(16).and_then(|d| u8::try_from(d).ok()))
        .collect::<Option<_>>()?;
    match digits.as_slice() {
        [r, g, b] => Some(from_u8([r * 17, g * 17, b * 17])),
        [r1, r0, g1, g0, b1, b0] => Some(from_u8([r1 * 16 + r0, g1 * 16 + g0, b1 * 16 + b0])),
        _ => None,
    }
}

/// Converts a colour specification to rgb in `[0, 1]`.
pub fn to_rgb(color: &ColorLike) -> Result<Vec3> {
    match color {
        ColorLike::Name(name) => {
            let name = name.trim();
            if let Some(hex) = name.strip_prefix('#') {
                return parse_hex(hex)
                    .ok_or_else(|| BrainrenderError::invalid(format!("invalid hex colour '{name}'")));
            }
            let lower = name.to_ascii_lowercase();
            NAMED
                .iter()
                .find(|(n, _)| *n == lower)
                .map(|(_, rgb)| from_u8(*rgb))
                .ok_or_else(|| BrainrenderError::invalid(format!("unknown colour '{name}'")))
        }
        ColorLike::Rgb(rgb) => {
            let v = Vec3::from_array(*rgb);
            if !v.is_finite() || v.min_element() < 0.0 {
                return Err(BrainrenderError::invalid(format!("invalid rgb colour {rgb:?}")));
            }
            if v.max_element() > 1.0 {
                if v.max_element() > 255.0 {
                    return Err(BrainrenderError::invalid(format!("invalid rgb colour {rgb:?}")));
                }
                Ok(v / 255.0)
            } else {
                Ok(v)
            }
        }
        ColorLike::Rgb8(rgb) => Ok(from_u8(*rgb)),
        ColorLike::Index(i) => Ok(from_u8(PALETTE[i % PALETTE.len()])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_hex_agree() {
        let named = to_rgb(&"salmon".into()).expect("known colour");
        let hex = to_rgb(&"#FA8072".into()).expect("valid hex");
        assert_eq!(named, hex);
        let short = to_rgb(&"#f00".into()).expect("valid short hex");
        assert_eq!(short, Vec3::X);
    }

    #[test]
    fn test_rgb_forms() {
        assert_eq!(to_rgb(&[1.0, 0.5, 0.0].into()).expect("floats"), Vec3::new(1.0, 0.5, 0.0));
        assert_eq!(to_rgb(&[255.0, 0.0, 0.0].into()).expect("0-255 floats"), Vec3::X);
        assert_eq!(to_rgb(&[0_u8, 255, 0].into()).expect("bytes"), Vec3::Y);
    }

    #[test]
    fn test_index_wraps() {
        let first = to_rgb(&ColorLike::Index(0)).expect("palette");
        let wrapped = to_rgb(&ColorLike::Index(PALETTE.len())).expect("palette");
        assert_eq!(first, wrapped);
    }

    #[test]
    fn test_failures() {
        assert!(to_rgb(&"not-a-colour".into()).is_err());
        assert!(to_rgb(&"#12".into()).is_err());
        assert!(to_rgb(&[-1.0, 0.0, 0.0].into()).is_err());
        assert!(to_rgb(&[300.0, 0.0, 0.0].into()).is_err());
    }

    fn in_unit_cube(v: Vec3) -> bool {
        v.is_finite() && v.min_element() >= 0.0 && v.max_element() <= 1.0
    }

    proptest::proptest! {
        #[test]
        fn every_accepted_colour_is_in_range(
            name in "\\PC{0,12}",
            rgb in proptest::array::uniform3(0.0f32..=255.0),
            bytes in proptest::array::uniform3(proptest::num::u8::ANY),
            index in proptest::num::usize::ANY,
        ) {
            if let Ok(v) = to_rgb(&ColorLike::Name(name)) {
                proptest::prop_assert!(in_unit_cube(v));
            }
            let v = to_rgb(&ColorLike::Rgb(rgb));
            proptest::prop_assert!(v.is_ok_and(in_unit_cube));
            proptest::prop_assert!(to_rgb(&ColorLike::Rgb8(bytes)).is_ok_and(in_unit_cube));
            proptest::prop_assert!(to_rgb(&ColorLike::Index(index)).is_ok_and(in_unit_cube));
        }

        #[test]
        fn hex_strings_always_parse(r in 0u8..=255, g in 0u8..=255, b in 0u8..=255) {
            let v = to_rgb(&ColorLike::Name(format!("#{r:02x}{g:02x}{b:02x}")));
            proptest::prop_assert_eq!(v.ok(), Some(from_u8([r, g, b])));
        }
    }
}
