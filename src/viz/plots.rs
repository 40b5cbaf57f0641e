use super::canvas::{Canvas, GLYPH, GRID, INK, PALETTE, Scale, text_width};
use super::describe::quantile;
use super::{PlotError, Plotter, Series};
use crate::stats::groups::Group;
use image::Rgb;
use log::debug;
use std::f64::consts::PI;
use std::path::PathBuf;

const MARGIN: u32 = 40;
const PAD: u32 = 8;
/// Rows above the plot area reserved for the title.
const TITLE_BAND: u32 = 36;
/// Rows below a frame for tick values and the axis label.
const AXIS_BAND: u32 = 36;
const BOX_BAND: u32 = 50;
const POINTS_LABEL: &str = "number of points";
const MAX_BINS: usize = 50;
const KDE_POINTS: usize = 200;

/// Box-and-whisker geometry; whiskers reach the furthest value within
/// 1.5 IQR of the box.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

impl BoxStats {
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let q1 = quantile(&sorted, 0.25);
        let q3 = quantile(&sorted, 0.75);
        let reach = 1.5 * (q3 - q1);
        let (lo_fence, hi_fence) = (q1 - reach, q3 + reach);
        let (inside, outliers): (Vec<f64>, Vec<f64>) =
            sorted.iter().partition(|v| (lo_fence..=hi_fence).contains(*v));
        Some(Self {
            lower_whisker: inside.first().copied().unwrap_or(q1),
            q1,
            median: quantile(&sorted, 0.5),
            q3,
            upper_whisker: inside.last().copied().unwrap_or(q3),
            outliers,
        })
    }
}

impl Plotter {
    /// Two stacked panels of horizontal box plots under one title. The bottom
    /// panel is drawn in a single colour.
    pub fn box_plot_pair(
        &self,
        top: &[Series],
        bottom: &[Series],
        image_name: &str,
    ) -> Result<PathBuf, PlotError> {
        if top.is_empty() || bottom.is_empty() {
            return Err(PlotError::Empty(image_name.to_owned()));
        }
        let (width, height) = (750, 800);
        let mut canvas = Canvas::new(width, height);
        draw_title(&mut canvas, image_name);
        let half = TITLE_BAND + (height - TITLE_BAND) / 2;
        draw_box_panel(&mut canvas, top, (TITLE_BAND, half), None, POINTS_LABEL, image_name)?;
        draw_box_panel(&mut canvas, bottom, (half, height), Some(PALETTE[2]), POINTS_LABEL, image_name)?;
        self.write(&canvas, image_name)
    }

    /// Histogram normalised to a density, with a Gaussian kernel density
    /// estimate drawn over it. The x axis is labelled with the series name.
    pub fn density_plot(&self, series: &Series, image_name: &str) -> Result<PathBuf, PlotError> {
        if series.values.is_empty() {
            return Err(PlotError::Empty(image_name.to_owned()));
        }
        let mut sorted = series.values.clone();
        sorted.sort_by(f64::total_cmp);
        let (lo, hi) = (sorted[0], sorted[sorted.len() - 1]);

        let bins = histogram(&sorted, bin_count(&sorted));
        let curve = kde(&sorted);
        let peak = bins
            .iter()
            .map(|b| b.density)
            .chain(curve.iter().map(|&(_, d)| d))
            .fold(0.0, f64::max);

        let (width, height) = (640, 480);
        let mut canvas = Canvas::new(width, height);
        draw_title(&mut canvas, image_name);

        let peak_label = format!("{peak:.3}");
        let left = text_width(&peak_label, 1) + 2 * PAD;
        let (right, floor) = (width - MARGIN, height - AXIS_BAND);
        let x = Scale::new(lo, hi, left, right);
        // Pixel rows grow downwards.
        let y = Scale::new(0.0, peak, floor, TITLE_BAND + PAD);
        let base = y.map(0.0);
        canvas.hline(left, right, base, INK);
        canvas.vline(left, TITLE_BAND, base, INK);
        canvas.text(PAD, base - GLYPH / 2, "0", 1, INK);
        canvas.text(PAD, y.map(peak) - GLYPH / 2, &peak_label, 1, INK);
        canvas.text(left + PAD, TITLE_BAND, "density", 1, INK);
        draw_x_axis(&mut canvas, &x, (lo, hi), (left, right), base, &series.name);

        let fill = PALETTE[0];
        for bin in bins.iter().filter(|b| b.density > 0.0) {
            let (x0, x1) = (x.map(bin.start), x.map(bin.end));
            let top = y.map(bin.density);
            if top < base {
                canvas.fill_rect(x0, top, x1, base - 1, lighten(fill));
                canvas.stroke_rect(x0, top, x1, base, fill);
            }
        }
        for pair in curve.windows(2) {
            let from = (x.map(pair[0].0), y.map(pair[0].1));
            let to = (x.map(pair[1].0), y.map(pair[1].1));
            canvas.line(from, to, fill);
        }
        self.write(&canvas, image_name)
    }

    /// One horizontal box per group, highest mean on top, each labelled with
    /// its group name.
    pub fn ordered_box_plot(&self, groups: &[Group], image_name: &str) -> Result<PathBuf, PlotError> {
        let series: Vec<Series> = order_by_mean(groups)
            .into_iter()
            .map(|g| Series::new(g.name.as_str(), g.values.clone()))
            .collect();
        if series.is_empty() {
            return Err(PlotError::Empty(image_name.to_owned()));
        }
        let height = ordered_plot_height(series.len());
        let mut canvas = Canvas::new(750, height);
        draw_title(&mut canvas, image_name);
        draw_box_panel(&mut canvas, &series, (TITLE_BAND, height), None, POINTS_LABEL, image_name)?;
        self.write(&canvas, image_name)
    }

    fn write(&self, canvas: &Canvas, image_name: &str) -> Result<PathBuf, PlotError> {
        let path = self.image_path(image_name);
        canvas.save(&path)?;
        debug!("wrote {}", path.display());
        Ok(path)
    }
}

fn ordered_plot_height(boxes: usize) -> u32 {
    TITLE_BAND + PAD + BOX_BAND * boxes as u32 + AXIS_BAND
}

/// `east_minus_west_density` becomes `East minus west density`.
pub fn title(image_name: &str) -> String {
    let spaced = image_name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn draw_title(canvas: &mut Canvas, image_name: &str) {
    canvas.text(MARGIN, PAD, &title(image_name), 2, INK);
}

fn tick_label(value: f64) -> String {
    if value.fract() == 0.0 { format!("{value:.0}") } else { format!("{value:.1}") }
}

/// Ticks at both ends and the middle of `range`, with `label` centred below.
fn draw_x_axis(
    canvas: &mut Canvas,
    x: &Scale,
    (lo, hi): (f64, f64),
    (left, right): (u32, u32),
    floor: u32,
    label: &str,
) {
    for value in [lo, (lo + hi) / 2.0, hi] {
        let px = x.map(value);
        let text = tick_label(value);
        canvas.vline(px, floor, floor + 3, INK);
        canvas.text(px.saturating_sub(text_width(&text, 1) / 2), floor + 6, &text, 1, INK);
    }
    let center = left + (right - left) / 2;
    canvas.text(center.saturating_sub(text_width(label, 1) / 2), floor + 20, label, 1, INK);
}

/// Group sorted by descending mean. Equal means keep name order.
pub fn order_by_mean(groups: &[Group]) -> Vec<&Group> {
    let mut ordered: Vec<&Group> = groups.iter().filter(|g| !g.values.is_empty()).collect();
    ordered.sort_by(|a, b| a.name.cmp(&b.name));
    ordered.sort_by(|a, b| b.mean().total_cmp(&a.mean()));
    ordered
}

/// Boxes for `series` inside the rows `top..bottom`, with series names to
/// the left of the frame and the x axis below it.
fn draw_box_panel(
    canvas: &mut Canvas,
    series: &[Series],
    (top, bottom): (u32, u32),
    color: Option<Rgb<u8>>,
    x_label: &str,
    image_name: &str,
) -> Result<(), PlotError> {
    let boxes = series
        .iter()
        .map(|s| BoxStats::of(&s.values))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| PlotError::Empty(image_name.to_owned()))?;

    let lo = boxes
        .iter()
        .flat_map(|b| b.outliers.iter().copied().chain([b.lower_whisker]))
        .fold(f64::INFINITY, f64::min);
    let hi = boxes
        .iter()
        .flat_map(|b| b.outliers.iter().copied().chain([b.upper_whisker]))
        .fold(f64::NEG_INFINITY, f64::max);

    let label_width = series.iter().map(|s| text_width(&s.name, 1)).max().unwrap_or(0);
    let width = canvas.width();
    let left = (label_width + 2 * PAD).clamp(MARGIN, width / 2);
    let right = width - MARGIN;
    let x = Scale::new(lo, hi, left, right);

    let (top, floor) = (top + PAD, bottom - AXIS_BAND);
    canvas.stroke_rect(left, top, right, floor, INK);
    draw_x_axis(canvas, &x, (lo, hi), (left, right), floor, x_label);
    let band = (floor - top) / boxes.len() as u32;

    for (i, (b, s)) in boxes.iter().zip(series).enumerate() {
        let fill = color.unwrap_or(PALETTE[i % PALETTE.len()]);
        let center = top + band * i as u32 + band / 2;
        let half = (band * 2 / 5).max(2);
        let (y0, y1) = (center - half, center + half);

        let name_x = left.saturating_sub(PAD + text_width(&s.name, 1));
        canvas.text(name_x, center - GLYPH / 2, &s.name, 1, INK);
        canvas.hline(left + 1, right - 1, center, GRID);
        canvas.hline(x.map(b.lower_whisker), x.map(b.q1), center, INK);
        canvas.hline(x.map(b.q3), x.map(b.upper_whisker), center, INK);
        canvas.vline(x.map(b.lower_whisker), center - half / 2, center + half / 2, INK);
        canvas.vline(x.map(b.upper_whisker), center - half / 2, center + half / 2, INK);
        canvas.fill_rect(x.map(b.q1), y0, x.map(b.q3), y1, fill);
        canvas.stroke_rect(x.map(b.q1), y0, x.map(b.q3), y1, INK);
        canvas.vline(x.map(b.median), y0, y1, INK);
        for &v in &b.outliers {
            canvas.ring(x.map(v), center, INK);
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
struct Bin {
    start: f64,
    end: f64,
    density: f64,
}

/// Freedman–Diaconis bin count, capped at `MAX_BINS`. Falls back to the
/// square-root rule when the IQR is zero.
fn bin_count(sorted: &[f64]) -> usize {
    let n = sorted.len() as f64;
    let range = sorted[sorted.len() - 1] - sorted[0];
    let iqr = quantile(sorted, 0.75) - quantile(sorted, 0.25);
    let width = 2.0 * iqr / n.cbrt();
    let bins = if range > 0.0 && width > 0.0 { (range / width).ceil() } else { n.sqrt().ceil() };
    (bins as usize).clamp(1, MAX_BINS)
}

fn histogram(sorted: &[f64], bins: usize) -> Vec<Bin> {
    let (lo, hi) = (sorted[0], sorted[sorted.len() - 1]);
    let width = if hi > lo { (hi - lo) / bins as f64 } else { 1.0 };
    let mut counts = vec![0usize; bins];
    for &v in sorted {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    let n = sorted.len() as f64;
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| Bin {
            start: lo + width * i as f64,
            end: lo + width * (i + 1) as f64,
            density: count as f64 / (n * width),
        })
        .collect()
}

/// Gaussian KDE with Scott's bandwidth, sampled across the data range
/// extended by three bandwidths. Empty when the data has no spread.
fn kde(sorted: &[f64]) -> Vec<(f64, f64)> {
    let n = sorted.len() as f64;
    if sorted.len() < 2 {
        return Vec::new();
    }
    let mean = sorted.iter().sum::<f64>() / n;
    let std = (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();
    let bandwidth = std * n.powf(-0.2);
    if bandwidth <= 0.0 || !bandwidth.is_finite() {
        return Vec::new();
    }
    let lo = sorted[0] - 3.0 * bandwidth;
    let hi = sorted[sorted.len() - 1] + 3.0 * bandwidth;
    let norm = 1.0 / (n * bandwidth * (2.0 * PI).sqrt());
    (0..KDE_POINTS)
        .map(|i| {
            let x = lo + (hi - lo) * i as f64 / (KDE_POINTS - 1) as f64;
            let kernel: f64 = sorted.iter().map(|v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp()).sum();
            (x, kernel * norm)
        })
        .collect()
}

fn lighten(Rgb([r, g, b]): Rgb<u8>) -> Rgb<u8> {
    let mix = |c: u8| ((c as u16 + 2 * 255) / 3) as u8;
    Rgb([mix(r), mix(g), mix(b)])
}
