use std::io::Cursor;

use anyhow::Result;
use image::{ImageFormat, Rgb, RgbImage};

use crate::detect::risk_level_counts;
use crate::types::{Detections, RiskFinding};

pub const SKY_BLUE: Rgb<u8> = Rgb([135, 206, 235]);
pub const LIGHT_GREEN: Rgb<u8> = Rgb([144, 238, 144]);
pub const SALMON: Rgb<u8> = Rgb([250, 128, 114]);

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([40, 40, 40]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);

const MARGIN_LEFT: u32 = 40;
const MARGIN_RIGHT: u32 = 20;
const MARGIN_TOP: u32 = 20;
const MARGIN_BOTTOM: u32 = 30;

/// A single-series bar chart. Labels are not drawn into the bitmap; callers
/// render `title` and `bars` as captions alongside the image.
#[derive(Debug, Clone)]
pub struct BarChart {
    pub title: String,
    pub bars: Vec<(String, usize)>,
    pub color: Rgb<u8>,
    pub width: u32,
    pub height: u32,
}

impl BarChart {
    pub fn new(title: impl Into<String>, bars: Vec<(String, usize)>, color: Rgb<u8>) -> Self {
        Self {
            title: title.into(),
            bars,
            color,
            width: 600,
            height: 300,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(MARGIN_LEFT + MARGIN_RIGHT + 10);
        self.height = height.max(MARGIN_TOP + MARGIN_BOTTOM + 10);
        self
    }

    /// Caption line listing every bar, e.g. `High: 2, Medium: 0, Low: 1`.
    pub fn legend(&self) -> String {
        self.bars
            .iter()
            .map(|(label, count)| format!("{label}: {count}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn render(&self) -> RgbImage {
        let mut img = RgbImage::from_pixel(self.width, self.height, WHITE);

        let plot_left = MARGIN_LEFT;
        let plot_right = self.width - MARGIN_RIGHT;
        let plot_top = MARGIN_TOP;
        let plot_bottom = self.height - MARGIN_BOTTOM;
        let plot_h = plot_bottom - plot_top;
        let plot_w = plot_right - plot_left;

        let max = self.bars.iter().map(|(_, c)| *c).max().unwrap_or(0).max(1) as u32;

        // One gridline per unit, thinned out for tall scales.
        let step = (max / 10).max(1);
        let mut tick = step;
        while tick <= max {
            let y = plot_bottom - plot_h * tick / max;
            fill_rect(&mut img, plot_left, y, plot_w, 1, GRID);
            tick += step;
        }

        if !self.bars.is_empty() {
            let slot = plot_w / self.bars.len() as u32;
            let bar_w = (slot * 3 / 5).max(1);
            for (i, (_, count)) in self.bars.iter().enumerate() {
                let h = plot_h * (*count as u32) / max;
                let x = plot_left + slot * i as u32 + (slot - bar_w) / 2;
                fill_rect(&mut img, x, plot_bottom - h, bar_w, h, self.color);
            }
        }

        fill_rect(&mut img, plot_left, plot_top, 1, plot_h + 1, AXIS);
        fill_rect(&mut img, plot_left, plot_bottom, plot_w, 1, AXIS);
        img
    }

    pub fn render_png(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.render()
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(buf)
    }
}

fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    let x_end = (x + w).min(img.width());
    let y_end = (y + h).min(img.height());
    for py in y..y_end {
        for px in x..x_end {
            img.put_pixel(px, py, color);
        }
    }
}

fn occurrence_bars(detections: &Detections) -> Vec<(String, usize)> {
    detections
        .iter()
        .map(|(name, matches)| (name.clone(), matches.len()))
        .collect()
}

pub fn clause_chart(clauses: &Detections) -> BarChart {
    BarChart::new("Detected Key Clauses", occurrence_bars(clauses), SKY_BLUE)
}

pub fn obligation_chart(obligations: &Detections) -> BarChart {
    BarChart::new(
        "Detected Hidden Obligations and Dependencies",
        occurrence_bars(obligations),
        LIGHT_GREEN,
    )
}

pub fn risk_level_chart(findings: &[RiskFinding]) -> BarChart {
    let bars = risk_level_counts(findings)
        .into_iter()
        .map(|(level, count)| (level.to_string(), count))
        .collect();
    BarChart::new("Detected Risks by Level", bars, SALMON).with_size(400, 300)
}
