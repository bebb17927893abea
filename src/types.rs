use fixed::types::I32F32;

/// PDF user-space length (1/72 in), stored as fixed-point so page geometry
/// survives round trips through the writer without float drift.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Pt(I32F32);

impl Pt {
    pub const ZERO: Pt = Pt(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Pt {
        if !value.is_finite() {
            return Pt::ZERO;
        }
        let milli = (value as f64 * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Pt::from_milli_i64(milli)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_f64(self) -> f64 {
        self.0.to_num()
    }

    pub fn to_milli_i64(self) -> i64 {
        let bits = self.0.to_bits() as i128;
        let denom = 1i128 << 32;
        let scaled = bits * 1000;
        let adj = if scaled >= 0 { denom / 2 } else { -denom / 2 };
        let milli = (scaled + adj) / denom;
        milli.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn from_milli_i64(milli: i64) -> Pt {
        let milli = milli as i128;
        let denom = 1i128 << 32;
        let adj = if milli >= 0 { 500 } else { -500 };
        let bits = (milli * denom + adj) / 1000;
        let bits = bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Pt(I32F32::from_bits(bits))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Pt,
    pub height: Pt,
}

impl Size {
    pub fn a4() -> Self {
        Self {
            width: Pt::from_f32(595.28),
            height: Pt::from_f32(841.89),
        }
    }

    pub fn letter() -> Self {
        // 8.5in x 11in at 72pt/in.
        Self {
            width: Pt::from_f32(612.0),
            height: Pt::from_f32(792.0),
        }
    }

    pub fn new(width_pt: f32, height_pt: f32) -> Self {
        Self {
            width: Pt::from_f32(width_pt),
            height: Pt::from_f32(height_pt),
        }
    }

    pub fn is_positive(&self) -> bool {
        self.width > Pt::ZERO && self.height > Pt::ZERO
    }
}

/// Axis-aligned box in surface pixels, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn outset(&self, amount: f32) -> Rect {
        Rect {
            x: self.x - amount,
            y: self.y - amount,
            width: self.width + amount * 2.0,
            height: self.height + amount * 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    /// `#rrggbb` or `#rgb`.
    pub fn from_hex(raw: &str) -> Option<Self> {
        let hex = raw.trim().strip_prefix('#')?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return None,
        };
        let channel = |idx: usize| u8::from_str_radix(&expanded[idx..idx + 2], 16).ok();
        Some(Color::rgb8(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Space separated `H S% L%` triple, e.g. `221.2 83.2% 53.3%`.
    pub fn from_hsl_triple(raw: &str) -> Option<Self> {
        let mut parts = raw.split_whitespace();
        let h: f32 = parts.next()?.trim_end_matches("deg").parse().ok()?;
        let s: f32 = parts.next()?.strip_suffix('%')?.parse().ok()?;
        let l: f32 = parts.next()?.strip_suffix('%')?.parse().ok()?;
        if parts.next().is_some() || !(h.is_finite() && s.is_finite() && l.is_finite()) {
            return None;
        }
        Some(hsl_to_rgb(
            h.rem_euclid(360.0),
            (s / 100.0).clamp(0.0, 1.0),
            (l / 100.0).clamp(0.0, 1.0),
        ))
    }

    pub fn to_rgb8(self) -> [u8; 3] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b)]
    }
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> Color {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = h / 60.0;
    let x = c * (1.0 - (hp.rem_euclid(2.0) - 1.0).abs());
    let (r1, g1, b1) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    Color::rgb(r1 + m, g1 + m, b1 + m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_keeps_point_precision() {
        let a4 = Size::a4();
        assert_eq!(a4.width.to_milli_i64(), 595_280);
        assert_eq!(a4.height.to_milli_i64(), 841_890);
        assert!(a4.is_positive());
    }

    #[test]
    fn hex_colors_parse_short_and_long_forms() {
        assert_eq!(Color::from_hex("#09090b").unwrap().to_rgb8(), [9, 9, 11]);
        assert_eq!(Color::from_hex("#fff").unwrap().to_rgb8(), [255, 255, 255]);
        assert!(Color::from_hex("09090b").is_none());
        assert!(Color::from_hex("#12345").is_none());
    }

    #[test]
    fn hex_with_multibyte_chars_is_rejected() {
        assert!(Color::from_hex("#aééb").is_none());
        assert!(Color::from_hex("#éé").is_none());
        assert!(Color::from_hex("#12g456").is_none());
    }

    #[test]
    fn hsl_triple_matches_css_conversion() {
        // hsl(0 84.2% 60.2%) is tailwind's destructive red, #ef4444.
        let red = Color::from_hsl_triple("0 84.2% 60.2%").unwrap().to_rgb8();
        assert!((red[0] as i32 - 0xef).abs() <= 1);
        assert!((red[1] as i32 - 0x44).abs() <= 1);
        assert!((red[2] as i32 - 0x44).abs() <= 1);
    }

    #[test]
    fn malformed_hsl_is_rejected() {
        assert!(Color::from_hsl_triple("").is_none());
        assert!(Color::from_hsl_triple("240 5.9 10%").is_none());
        assert!(Color::from_hsl_triple("red").is_none());
        assert!(Color::from_hsl_triple("1 2% 3% 4%").is_none());
    }
}
