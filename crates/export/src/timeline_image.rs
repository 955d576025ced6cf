//! PNG pages visualising the clinical timeline.
//!
//! Each entry becomes one row: a marker on a vertical axis and a bar whose
//! length follows the amount of content in the note. Rows are split across
//! pages by the height available on each page; the first page shares its
//! space with the clinical summary.

use image::{ImageFormat, Rgb, RgbImage};
use std::path::{Path, PathBuf};
use tracing::debug;
use tumorboard_core::clinical::TimelineRow;
use tumorboard_core::error::ExportError;

/// Height of one wrapped summary line.
pub const LINE_HEIGHT_INCHES: f64 = 3.0 / 16.0;
/// Characters per wrapped summary line.
pub const LINE_WIDTH_CHARS: usize = 62;
pub const MAX_HEIGHT_INCHES: f64 = 7.0;
pub const PADDING_INCHES: f64 = 1.5;

const DPI: f64 = 96.0;
const PAGE_WIDTH_INCHES: f64 = 6.5;
const ROW_HEIGHT_INCHES: f64 = 0.5;

const AXIS_X: i64 = 36;
const MARKER_RADIUS: i64 = 8;
const BAR_START_X: i64 = 60;
const BAR_THICKNESS: i64 = 10;
/// Note length that fills the whole bar.
const FULL_BAR_CHARS: usize = 400;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([120, 120, 120]);
const PALETTE: [Rgb<u8>; 6] = [
    Rgb([31, 119, 180]),
    Rgb([255, 127, 14]),
    Rgb([44, 160, 44]),
    Rgb([214, 39, 40]),
    Rgb([148, 103, 189]),
    Rgb([140, 86, 75]),
];

/// Lines `text` occupies when word-wrapped at `width` columns.
///
/// Words longer than a line are broken; blank text takes no lines.
pub fn wrapped_line_count(text: &str, width: usize) -> usize {
    let width = width.max(1);
    let mut lines = 0;
    let mut current = 0;
    for word in text.split_whitespace() {
        let mut len = word.chars().count();
        if current > 0 && current + 1 + len <= width {
            current += 1 + len;
            continue;
        }
        if current > 0 {
            lines += 1;
        }
        while len > width {
            lines += 1;
            len -= width;
        }
        current = len;
    }
    if current > 0 {
        lines += 1;
    }
    lines
}

/// Height taken by the clinical summary bullets on the first page.
pub fn summary_height(entries: &[String]) -> f64 {
    let lines: usize = entries
        .iter()
        .map(|entry| wrapped_line_count(entry, LINE_WIDTH_CHARS))
        .sum();
    lines as f64 * LINE_HEIGHT_INCHES
}

/// Height left for the timeline on the first page.
pub fn first_page_height(summary_entries: &[String]) -> f64 {
    (MAX_HEIGHT_INCHES - summary_height(summary_entries) - PADDING_INCHES).max(0.0)
}

fn rows_per_page(height_inches: f64) -> usize {
    ((height_inches / ROW_HEIGHT_INCHES).floor() as usize).max(1)
}

fn inches_to_px(inches: f64) -> u32 {
    (inches * DPI).round() as u32
}

fn color_for(note_type: &str) -> Rgb<u8> {
    let hash = note_type
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    PALETTE[hash % PALETTE.len()]
}

fn fill_rect(img: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    for y in y0.max(0)..y1.min(h) {
        for x in x0.max(0)..x1.min(w) {
            img.put_pixel(x as u32, y as u32, color);
        }
    }
}

fn fill_circle(img: &mut RgbImage, cx: i64, cy: i64, r: i64, color: Rgb<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    for y in (cy - r).max(0)..(cy + r + 1).min(h) {
        for x in (cx - r).max(0)..(cx + r + 1).min(w) {
            if (x - cx).pow(2) + (y - cy).pow(2) <= r * r {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

fn render_page(rows: &[TimelineRow]) -> RgbImage {
    let width = inches_to_px(PAGE_WIDTH_INCHES);
    let row_px = inches_to_px(ROW_HEIGHT_INCHES) as i64;
    let height = (row_px * rows.len() as i64).max(1) as u32;
    let mut img = RgbImage::from_pixel(width, height, BACKGROUND);

    fill_rect(&mut img, AXIS_X - 1, 0, AXIS_X + 2, height as i64, AXIS);

    let bar_span = width as i64 - BAR_START_X - 16;
    for (i, row) in rows.iter().enumerate() {
        let center = row_px * i as i64 + row_px / 2;
        let color = color_for(&row.note_type);
        fill_circle(&mut img, AXIS_X, center, MARKER_RADIUS, color);

        let chars = row.note_summary.chars().count().min(FULL_BAR_CHARS).max(1);
        let bar_len = (bar_span * chars as i64 / FULL_BAR_CHARS as i64).max(MARKER_RADIUS);
        fill_rect(
            &mut img,
            BAR_START_X,
            center - BAR_THICKNESS / 2,
            BAR_START_X + bar_len,
            center + BAR_THICKNESS / 2,
            color,
        );
    }
    img
}

/// Write the timeline as PNG pages into `dir`, in order.
///
/// The first page holds as many rows as fit in `height_first`; following
/// pages use `height_after`. Every page holds at least one row.
pub fn create_timeline_images_by_height(
    rows: &[TimelineRow],
    height_first: f64,
    height_after: f64,
    dir: &Path,
) -> Result<Vec<PathBuf>, ExportError> {
    let mut paths = Vec::new();
    let mut remaining = rows;
    let mut capacity = rows_per_page(height_first);

    while !remaining.is_empty() {
        let take = capacity.min(remaining.len());
        let (page, rest) = remaining.split_at(take);
        let path = dir.join(format!("timeline_{}.png", paths.len() + 1));
        render_page(page)
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| ExportError::Image(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), rows = page.len(), "Wrote timeline page");
        paths.push(path);
        remaining = rest;
        capacity = rows_per_page(height_after);
    }
    Ok(paths)
}
