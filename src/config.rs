use plotters::style::RGBColor;
use std::path::PathBuf;

use crate::{COL_FEMALE, COL_MALE, COL_TOTAL, STUNTING_INDICATOR};

pub const DEFAULT_DATA_PATH: &str = "data/stunting-under-five_rows.csv";
pub const DEFAULT_OUTPUT_PATH: &str = "analytics/outputs/stunting_gender_trend.png";

/// What the reshaper does with several rates for the same year and category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// fail with a reshape error
    #[default]
    Reject,
    /// average them, as a pivot table does by default
    Mean,
    /// keep the one found last in the file
    Last,
}

/// One line of the chart: the table column it reads and how it is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStyle {
    pub column: &'static str,
    pub color: RGBColor,
}

/// Everything the renderer needs to know about the look of the figure.
/// Sizes given in points are converted to pixels with `dpi / 72`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartStyle {
    pub title: String,
    pub title_color: RGBColor,
    pub title_pt: f64,
    pub x_desc: String,
    pub y_desc: String,
    pub y_range: (f64, f64),
    /// width and height in inches
    pub figure_in: (f64, f64),
    pub dpi: u32,
    pub line_width_pt: f64,
    /// drawn in this order, which is also the legend order
    pub series: Vec<SeriesStyle>,
    /// the series whose area down to the baseline is filled
    pub fill_column: &'static str,
    pub fill_opacity: f64,
    pub grid_color: RGBColor,
    pub text_color: RGBColor,
    pub label_pt: f64,
    pub tick_pt: f64,
    pub legend_pt: f64,
}

impl ChartStyle {
    pub fn pixel_size(&self) -> (u32, u32) {
        let dpi = self.dpi as f64;
        (
            (self.figure_in.0 * dpi).round() as u32,
            (self.figure_in.1 * dpi).round() as u32,
        )
    }

    /// the DPI as the pixels-per-meter a png pHYs chunk stores
    pub fn pixels_per_meter(&self) -> u32 {
        (self.dpi as f64 / 0.0254).round() as u32
    }

    /// converts a size in points to whole pixels at the figure DPI, at least 1
    pub fn px(&self, pt: f64) -> u32 {
        ((pt * self.dpi as f64 / 72.).round() as u32).max(1)
    }

    /// columns the renderer cannot do without
    pub fn required_columns(&self) -> Vec<&'static str> {
        let mut columns: Vec<&'static str> = self.series.iter().map(|s| s.column).collect();
        if !columns.contains(&self.fill_column) {
            columns.push(self.fill_column);
        }
        columns
    }
}

impl Default for ChartStyle {
    fn default() -> ChartStyle {
        let grey = |v: u8| RGBColor(v, v, v);
        ChartStyle {
            title: String::from("Stunting (Under Five) Rates by Gender (2000-2024)"),
            title_color: RGBColor(0x40, 0x53, 0x1A),
            title_pt: 16.,
            x_desc: String::from("Year"),
            y_desc: String::from("Rate per 100 Children"),
            y_range: (25., 55.),
            figure_in: (12., 6.),
            dpi: 300,
            line_width_pt: 2.5,
            series: vec![
                SeriesStyle {
                    column: COL_MALE,
                    color: RGBColor(0x25, 0x63, 0xEB),
                },
                SeriesStyle {
                    column: COL_FEMALE,
                    color: RGBColor(0xD9, 0x46, 0xEF),
                },
                SeriesStyle {
                    column: COL_TOTAL,
                    color: RGBColor(0x16, 0xA3, 0x4A),
                },
            ],
            fill_column: COL_TOTAL,
            fill_opacity: 0.15,
            // seaborn whitegrid: ".8" grid and spines, ".15" text
            grid_color: grey(204),
            text_color: grey(38),
            label_pt: 12.,
            tick_pt: 11.,
            legend_pt: 11.,
        }
    }
}

/// The settings of one run, passed to both the loader and the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_path: PathBuf,
    pub output_path: PathBuf,
    pub indicator: String,
    pub duplicates: DuplicatePolicy,
    pub chart: ChartStyle,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            indicator: String::from(STUNTING_INDICATOR),
            duplicates: DuplicatePolicy::default(),
            chart: ChartStyle::default(),
        }
    }
}
