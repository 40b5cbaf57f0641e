use super::PlotError;
use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::Path;

pub(crate) const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub(crate) const INK: Rgb<u8> = Rgb([60, 60, 60]);
pub(crate) const GRID: Rgb<u8> = Rgb([225, 225, 225]);

/// Side of one font8x8 glyph, in pixels at scale 1.
pub(crate) const GLYPH: u32 = 8;

/// Default categorical palette, cycled per box.
pub(crate) const PALETTE: [Rgb<u8>; 10] = [
    Rgb([76, 114, 176]),
    Rgb([221, 132, 82]),
    Rgb([85, 168, 104]),
    Rgb([196, 78, 82]),
    Rgb([129, 114, 179]),
    Rgb([147, 120, 96]),
    Rgb([218, 139, 195]),
    Rgb([140, 140, 140]),
    Rgb([204, 185, 116]),
    Rgb([100, 181, 205]),
];

/// Maps a data range onto a pixel range.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scale {
    lo: f64,
    hi: f64,
    px_lo: f64,
    px_hi: f64,
}

impl Scale {
    /// A flat data range is widened so every value still lands in view.
    pub(crate) fn new(lo: f64, hi: f64, px_lo: u32, px_hi: u32) -> Self {
        let (lo, hi) = if hi > lo { (lo, hi) } else { (lo - 1.0, hi + 1.0) };
        let pad = (hi - lo) * 0.05;
        Self { lo: lo - pad, hi: hi + pad, px_lo: px_lo as f64, px_hi: px_hi as f64 }
    }

    pub(crate) fn map(&self, value: f64) -> u32 {
        let t = (value - self.lo) / (self.hi - self.lo);
        (self.px_lo + t * (self.px_hi - self.px_lo)).round().max(0.0) as u32
    }
}

pub(crate) struct Canvas {
    img: RgbImage,
}

impl Canvas {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self { img: RgbImage::from_pixel(width, height, WHITE) }
    }

    pub(crate) fn width(&self) -> u32 {
        self.img.width()
    }

    pub(crate) fn height(&self) -> u32 {
        self.img.height()
    }

    fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if x >= 0 && y >= 0 && (x as u32) < self.img.width() && (y as u32) < self.img.height() {
            self.img.put_pixel(x as u32, y as u32, color);
        }
    }

    /// Fills the inclusive rectangle spanned by two corners.
    pub(crate) fn fill_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
        let (x0, x1) = (x0.min(x1), x0.max(x1));
        let (y0, y1) = (y0.min(y1), y0.max(y1));
        for y in y0..=y1 {
            for x in x0..=x1 {
                self.put(x as i64, y as i64, color);
            }
        }
    }

    pub(crate) fn stroke_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
        self.hline(x0, x1, y0, color);
        self.hline(x0, x1, y1, color);
        self.vline(x0, y0, y1, color);
        self.vline(x1, y0, y1, color);
    }

    pub(crate) fn hline(&mut self, x0: u32, x1: u32, y: u32, color: Rgb<u8>) {
        self.fill_rect(x0, y, x1, y, color);
    }

    pub(crate) fn vline(&mut self, x: u32, y0: u32, y1: u32, color: Rgb<u8>) {
        self.fill_rect(x, y0, x, y1, color);
    }

    /// Bresenham line between two points.
    pub(crate) fn line(&mut self, from: (u32, u32), to: (u32, u32), color: Rgb<u8>) {
        let (mut x, mut y) = (from.0 as i64, from.1 as i64);
        let (x1, y1) = (to.0 as i64, to.1 as i64);
        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.put(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Draws `text` with its top-left corner at `(x, y)`, each glyph pixel
    /// blown up to `scale`×`scale`. Characters outside basic Latin are skipped.
    pub(crate) fn text(&mut self, x: u32, y: u32, text: &str, scale: u32, color: Rgb<u8>) {
        for (i, c) in text.chars().enumerate() {
            let Some(glyph) = BASIC_FONTS.get(c) else {
                continue;
            };
            let left = x + i as u32 * GLYPH * scale;
            for (row, bits) in (0u32..).zip(glyph) {
                for col in (0..GLYPH).filter(|col| bits & (1 << col) != 0) {
                    let (px, py) = (left + col * scale, y + row * scale);
                    self.fill_rect(px, py, px + scale - 1, py + scale - 1, color);
                }
            }
        }
    }

    /// Small hollow marker for outliers.
    pub(crate) fn ring(&mut self, cx: u32, cy: u32, color: Rgb<u8>) {
        self.stroke_rect(cx.saturating_sub(2), cy.saturating_sub(2), cx + 2, cy + 2, color);
    }

    pub(crate) fn save(&self, path: &Path) -> Result<(), PlotError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| PlotError::Io(e, parent.to_path_buf()))?;
        }
        self.img.save(path).map_err(|e| PlotError::Image(e, path.to_path_buf()))
    }

    #[cfg(test)]
    pub(crate) fn pixel(&self, x: u32, y: u32) -> Rgb<u8> {
        *self.img.get_pixel(x, y)
    }
}

/// Pixel width of `text` drawn at `scale`.
pub(crate) fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * GLYPH * scale
}
