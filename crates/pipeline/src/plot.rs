//! Confusion matrix heatmap rendered to PNG
//!
//! Rows are true labels, columns predicted labels, darker blue for larger
//! counts. Captions, axis labels and counts are drawn with a small built-in
//! 3x5 glyph set so rendering needs no system fonts.

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::errors::{PipelineError, Result};
use crate::metrics::ConfusionMatrix;

/// File name of the plot inside the evaluation directory
pub const CONFUSION_MATRIX_FILE: &str = "confusion_matrix.png";

const TITLE: &str = "CONFUSION MATRIX";
const X_LABEL: &str = "PREDICTED LABELS";
const Y_LABEL: &str = "TRUE LABELS";

const CELL: i32 = 160;
const MARGIN: i32 = 40;
const TITLE_BAND: i32 = 60;
const LEFT_BAND: i32 = 70;
const BOTTOM_BAND: i32 = 70;
const DOT: i32 = 6;
const TITLE_DOT: i32 = 4;
const LABEL_DOT: i32 = 3;

const INK: RGBColor = RGBColor(8, 48, 107);

// 3x5 glyphs, one row per entry, high bit is the left column
const DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b001, 0b001, 0b001],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

fn glyph(ch: char) -> Option<[u8; 5]> {
    let rows = match ch {
        '0'..='9' => DIGITS[ch as usize - '0' as usize],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        _ => return None,
    };
    Some(rows)
}

#[derive(Clone, Copy)]
enum Direction {
    /// Left to right
    Across,
    /// Bottom to top, glyphs turned a quarter counterclockwise
    Up,
}

fn plot_error<E: std::fmt::Display>(err: E) -> PipelineError {
    PipelineError::Evaluation(format!("confusion matrix rendering failed: {err}"))
}

/// Blues colormap, `t` in [0, 1]
fn blues(t: f64) -> RGBColor {
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(lerp(247, 8), lerp(251, 48), lerp(255, 107))
}

/// Draw `text` centered on `center`. Characters without a glyph leave a gap.
fn draw_text<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    text: &str,
    center: (i32, i32),
    dot: i32,
    direction: Direction,
    color: &RGBColor,
) -> Result<()> {
    let advance = 4 * dot;
    let length = text.chars().count() as i32 * advance - dot;

    for (i, ch) in text.chars().enumerate() {
        let Some(rows) = glyph(ch) else {
            continue;
        };
        let offset = i as i32 * advance;
        for (row, bits) in rows.iter().enumerate() {
            let row = row as i32;
            for col in 0..3 {
                if bits & (0b100 >> col) == 0 {
                    continue;
                }
                let (x, y) = match direction {
                    Direction::Across => (
                        center.0 - length / 2 + offset + col * dot,
                        center.1 - 5 * dot / 2 + row * dot,
                    ),
                    Direction::Up => (
                        center.0 - 5 * dot / 2 + row * dot,
                        center.1 + length / 2 - offset - (col + 1) * dot,
                    ),
                };
                area.draw(&Rectangle::new([(x, y), (x + dot, y + dot)], color.filled()))
                    .map_err(plot_error)?;
            }
        }
    }
    Ok(())
}

/// Render `matrix` and return the encoded PNG
pub fn render_confusion_matrix(matrix: &ConfusionMatrix) -> Result<Vec<u8>> {
    let n = matrix.labels.len().max(1) as i32;
    let grid = n * CELL;
    let width = (LEFT_BAND + grid + MARGIN) as u32;
    let height = (TITLE_BAND + grid + BOTTOM_BAND) as u32;
    let max = matrix.max_count().max(1) as f64;

    let mut pixels = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;

        let grid_center = (LEFT_BAND + grid / 2, TITLE_BAND + grid / 2);
        draw_text(&root, TITLE, (width as i32 / 2, TITLE_BAND / 2), TITLE_DOT, Direction::Across, &INK)?;

        for (i, row) in matrix.counts.iter().enumerate() {
            for (j, &count) in row.iter().enumerate() {
                let x = LEFT_BAND + j as i32 * CELL;
                let y = TITLE_BAND + i as i32 * CELL;
                let t = count as f64 / max;
                root.draw(&Rectangle::new([(x, y), (x + CELL, y + CELL)], blues(t).filled()))
                    .map_err(plot_error)?;
                root.draw(&Rectangle::new([(x, y), (x + CELL, y + CELL)], BLACK.stroke_width(1)))
                    .map_err(plot_error)?;

                let ink = if t > 0.5 { WHITE } else { INK };
                let center = (x + CELL / 2, y + CELL / 2);
                draw_text(&root, &count.to_string(), center, DOT, Direction::Across, &ink)?;
            }
        }

        // Ticks sit next to the grid, axis labels further out
        let tick_x = LEFT_BAND - 12 - 5 * LABEL_DOT / 2;
        let label_x = tick_x - 12 - 5 * LABEL_DOT;
        let tick_y = TITLE_BAND + grid + 12 + 5 * LABEL_DOT / 2;
        let label_y = tick_y + 12 + 5 * LABEL_DOT;
        for (k, label) in matrix.labels.iter().enumerate() {
            let tick = format!("CLASS {label}");
            let middle = k as i32 * CELL + CELL / 2;
            draw_text(&root, &tick, (LEFT_BAND + middle, tick_y), LABEL_DOT, Direction::Across, &BLACK)?;
            draw_text(&root, &tick, (tick_x, TITLE_BAND + middle), LABEL_DOT, Direction::Up, &BLACK)?;
        }
        draw_text(&root, X_LABEL, (grid_center.0, label_y), LABEL_DOT, Direction::Across, &BLACK)?;
        draw_text(&root, Y_LABEL, (label_x, grid_center.1), LABEL_DOT, Direction::Up, &BLACK)?;

        root.present().map_err(plot_error)?;
    }

    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(&pixels, width, height, ColorType::Rgb8)
        .map_err(plot_error)?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    #[test]
    fn renders_png() {
        let cm = ConfusionMatrix::new(&[0, 0, 1, 1, 1], &[0, 1, 1, 1, 0]).unwrap();
        let png = render_confusion_matrix(&cm).unwrap();
        assert!(png.starts_with(PNG_MAGIC));
    }

    #[test]
    fn rendering_is_deterministic() {
        let cm = ConfusionMatrix::new(&[0, 1, 1, 0], &[0, 1, 0, 0]).unwrap();
        assert_eq!(
            render_confusion_matrix(&cm).unwrap(),
            render_confusion_matrix(&cm).unwrap()
        );
    }

    #[test]
    fn captions_and_ticks_are_drawn() {
        let cm = ConfusionMatrix::new(&[0, 0, 1, 1], &[0, 1, 1, 1]).unwrap();
        let png = render_confusion_matrix(&cm).unwrap();
        let img = image::load_from_memory_with_format(&png, image::ImageFormat::Png)
            .unwrap()
            .to_rgb8();

        let grid = 2 * CELL;
        assert_eq!(img.width(), (LEFT_BAND + grid + MARGIN) as u32);
        assert_eq!(img.height(), (TITLE_BAND + grid + BOTTOM_BAND) as u32);

        let inked = |x0: i32, y0: i32, x1: i32, y1: i32| {
            (y0..y1).any(|y| {
                (x0..x1).any(|x| img.get_pixel(x as u32, y as u32).0 != [255, 255, 255])
            })
        };
        let (w, h) = (img.width() as i32, img.height() as i32);
        assert!(inked(0, 0, w, TITLE_BAND), "title band is blank");
        assert!(inked(0, TITLE_BAND, LEFT_BAND, TITLE_BAND + grid), "row labels missing");
        assert!(inked(LEFT_BAND, TITLE_BAND + grid + 2, w, h), "column labels missing");
    }

    #[test]
    fn caption_characters_all_have_glyphs() {
        for text in [TITLE, X_LABEL, Y_LABEL, "CLASS -10"] {
            for ch in text.chars().filter(|c| *c != ' ') {
                assert!(glyph(ch).is_some(), "no glyph for {ch:?}");
            }
        }
        assert!(glyph('?').is_none());
    }

    #[test]
    fn colormap_endpoints() {
        assert_eq!(blues(0.0), RGBColor(247, 251, 255));
        assert_eq!(blues(1.0), RGBColor(8, 48, 107));
    }
}
