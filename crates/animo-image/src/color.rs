//! Key-color selection.
//!
//! Chromakey works by baking a known flat color behind the subject and
//! keying it back out after generation. The baked color must be as far
//! as possible from every color the subject actually contains, otherwise
//! the keyer eats the subject. The search runs over a small fixed palette
//! of perceptually separated candidates so results are deterministic.

/// An RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Euclidean distance in RGB space.
    pub fn distance(&self, other: &Rgb) -> f64 {
        let dr = self.r as f64 - other.r as f64;
        let dg = self.g as f64 - other.g as f64;
        let db = self.b as f64 - other.b as f64;
        (dr * dr + dg * dg + db * db).sqrt()
    }

    /// Hex form FFmpeg filters accept, e.g. `0x00FFFF`.
    pub fn to_ffmpeg_hex(&self) -> String {
        format!("0x{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Which channel dominates this color, as a despill target.
    /// Returns `'r'`, `'g'` or `'b'`.
    pub fn dominant_channel(&self) -> char {
        if self.g >= self.r && self.g >= self.b {
            'g'
        } else if self.b >= self.r {
            'b'
        } else {
            'r'
        }
    }
}

/// Fixed candidate palette for key-color selection.
///
/// Candidate order is the tie-break: the first candidate achieving the
/// maximum minimum-distance wins.
pub const KEY_CANDIDATES: [Rgb; 5] = [
    Rgb::new(0, 255, 255),   // cyan
    Rgb::new(255, 0, 255),   // magenta
    Rgb::new(0, 0, 255),     // blue
    Rgb::new(255, 0, 0),     // red
    Rgb::new(255, 105, 180), // hot pink
];

/// Pick the palette color farthest (by minimum distance) from every
/// foreground pixel.
///
/// An empty foreground set returns the first candidate; callers decide
/// whether that is worth warning about.
pub fn find_key_color(foreground: &[Rgb]) -> Rgb {
    let mut best = KEY_CANDIDATES[0];
    let mut best_min = f64::MIN;

    for candidate in KEY_CANDIDATES {
        let min_dist = foreground
            .iter()
            .map(|px| candidate.distance(px))
            .fold(f64::INFINITY, f64::min);
        // Strict comparison keeps the earliest candidate on ties.
        if min_dist > best_min {
            best_min = min_dist;
            best = candidate;
        }
    }

    best
}
