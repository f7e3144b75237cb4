//! Drawing the gender trend chart and writing it to disk.
//!
//! The figure is drawn completely in memory, the file is only written once
//! drawing succeeded: a failed render leaves the previous file (or none) in place.

use plotters::coord::Shift;
use plotters::prelude::*;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::config::{ChartStyle, Config};
use crate::error::StuntingError;
use crate::load::GenderTable;
use crate::min_and_max;

/// The columns of the table resolved against the chart style, ready to draw.
struct TrendLines<'a> {
    years: &'a [i32],
    x_range: (i32, i32),
    lines: Vec<(&'static str, RGBColor, &'a [Option<f64>])>,
    fill: (RGBColor, &'a [Option<f64>]),
}

impl<'a> TrendLines<'a> {
    fn resolve(table: &'a GenderTable, style: &ChartStyle) -> Result<TrendLines<'a>, StuntingError> {
        let missing: Vec<&str> = style
            .required_columns()
            .into_iter()
            .filter(|c| table.column(c).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(StuntingError::missing_columns(&missing));
        }
        if let Some((name, values)) = table
            .columns
            .iter()
            .find(|(_, values)| values.len() != table.years.len())
        {
            return Err(StuntingError::Render(format!(
                "column {} holds {} value(s) for {} year(s)",
                name,
                values.len(),
                table.years.len()
            )));
        }
        let x_range = match min_and_max(&table.years) {
            Some((first, last)) if first < last => (first, last),
            Some((year, _)) => (year - 1, year + 1),
            None => return Err(StuntingError::Render(String::from("no years to plot"))),
        };
        let mut lines = Vec::with_capacity(style.series.len());
        for s in style.series.iter() {
            let values = table.column(s.column).unwrap_or_default();
            lines.push((s.column, s.color, values));
        }
        let fill_color = style
            .series
            .iter()
            .find(|s| s.column == style.fill_column)
            .map_or(style.text_color, |s| s.color);
        let fill = (fill_color, table.column(style.fill_column).unwrap_or_default());
        Ok(TrendLines {
            years: &table.years,
            x_range,
            lines,
            fill,
        })
    }
}

/// Renders `table` to `config.output_path`, creating its directory if needed.
/// An `.svg` path is drawn as svg, any other path is encoded as png.
pub fn render(table: &GenderTable, config: &Config) -> Result<(), StuntingError> {
    let style = &config.chart;
    let fout = config.output_path.as_path();
    let trend = TrendLines::resolve(table, style)?;

    if let Some(dir) = fout.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| write_err(fout, e))?;
    }

    let (w, h) = style.pixel_size();
    let is_svg = fout
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("svg"));
    if is_svg {
        let svg = draw_svg(&trend, style)?;
        fs::write(fout, svg).map_err(|e| write_err(fout, e))?;
    } else {
        let rgb = draw_rgb(&trend, style)?;
        let png = encode_png(&rgb, style).map_err(|e| write_err(fout, e))?;
        fs::write(fout, png).map_err(|e| write_err(fout, e))?;
    }
    info!("wrote {}x{} chart to {}", w, h, fout.display());
    Ok(())
}

fn write_err(fout: &Path, e: impl std::fmt::Display) -> StuntingError {
    StuntingError::Write {
        path: fout.to_path_buf(),
        reason: e.to_string(),
    }
}

fn draw_rgb(trend: &TrendLines, style: &ChartStyle) -> Result<Vec<u8>, StuntingError> {
    let (w, h) = style.pixel_size();
    let mut buf = vec![0u8; w as usize * h as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (w, h)).into_drawing_area();
        draw_chart(&root, trend, style).map_err(|e| StuntingError::Render(e.to_string()))?;
        root.present()
            .map_err(|e| StuntingError::Render(e.to_string()))?;
    }
    Ok(buf)
}

/// Encodes the RGB buffer as png, recording the figure DPI in the pHYs chunk.
fn encode_png(rgb: &[u8], style: &ChartStyle) -> Result<Vec<u8>, png::EncodingError> {
    let (w, h) = style.pixel_size();
    let ppm = style.pixels_per_meter();
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, w, h);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: ppm,
            yppu: ppm,
            unit: png::Unit::Meter,
        }));
        let mut writer = encoder.write_header()?;
        writer.write_image_data(rgb)?;
        writer.finish()?;
    }
    Ok(out)
}

fn draw_svg(trend: &TrendLines, style: &ChartStyle) -> Result<String, StuntingError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, style.pixel_size()).into_drawing_area();
        draw_chart(&root, trend, style).map_err(|e| StuntingError::Render(e.to_string()))?;
        root.present()
            .map_err(|e| StuntingError::Render(e.to_string()))?;
    }
    Ok(svg)
}

fn draw_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    trend: &TrendLines,
    style: &ChartStyle,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let font = |pt: f64, color: &RGBColor| ("sans-serif", style.px(pt) as f64).into_font().color(color);
    let (y_min, y_max) = style.y_range;
    let (x_min, x_max) = trend.x_range;
    let grid_px = style.px(1.);
    let line_px = style.px(style.line_width_pt);
    let legend_len = style.px(24.) as i32;
    // never more labels than years, so every tick falls on a whole year
    let x_labels = ((x_max - x_min) as usize + 1).min(13);

    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(root)
        .margin(style.px(10.))
        .caption(&style.title, font(style.title_pt, &style.title_color))
        .x_label_area_size(style.px(36.))
        .y_label_area_size(style.px(44.))
        .build_cartesian_2d(x_min as f64..x_max as f64, y_min..y_max)?;
    chart
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .bold_line_style(style.grid_color.stroke_width(grid_px))
        .axis_style(style.grid_color.stroke_width(grid_px))
        .set_all_tick_mark_size(0)
        .label_style(font(style.tick_pt, &style.text_color))
        .axis_desc_style(font(style.label_pt, &style.text_color))
        .x_desc(style.x_desc.as_str())
        .y_desc(style.y_desc.as_str())
        .x_labels(x_labels)
        .y_labels(7)
        .x_label_formatter(&|year: &f64| format!("{:.0}", year))
        .y_label_formatter(&|rate: &f64| format!("{:.0}", rate))
        .draw()?;

    // the band goes first so the lines stay on top of it
    let (fill_color, fill_values) = trend.fill;
    for segment in segments(trend.years, fill_values) {
        let edge = with_crossings(&segment, y_min, y_max);
        let area = AreaSeries::new(
            edge.into_iter().map(|(x, y)| (x, y.clamp(y_min, y_max))),
            y_min,
            &fill_color.mix(style.fill_opacity),
        )
        .border_style(&TRANSPARENT);
        chart.draw_series(area)?;
    }

    for &(column, color, values) in trend.lines.iter() {
        let line = color.stroke_width(line_px);
        // an empty series only to register the legend entry once
        chart
            .draw_series(LineSeries::new(std::iter::empty::<(f64, f64)>(), line))?
            .label(column)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + legend_len, y)], line));
        let parts: Vec<Vec<(f64, f64)>> = segments(trend.years, values)
            .iter()
            .flat_map(|segment| clip_to_range(segment, y_min, y_max))
            .collect();
        debug!("{}: {} visible part(s)", column, parts.len());
        for part in parts {
            chart.draw_series(LineSeries::new(part, line))?;
        }
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&TRANSPARENT)
        .border_style(&TRANSPARENT)
        .legend_area_size(legend_len + style.px(6.) as i32)
        .label_font(font(style.legend_pt, &style.text_color))
        .draw()?;
    Ok(())
}

/// splits a column at its missing values into runs of (year, rate)
fn segments(years: &[i32], values: &[Option<f64>]) -> Vec<Vec<(f64, f64)>> {
    let mut start = 0;
    values
        .split(|v| v.is_none())
        .filter_map(|chunk| {
            let first = start;
            start += chunk.len() + 1;
            if chunk.is_empty() {
                return None;
            }
            let xs = years[first..first + chunk.len()].iter().map(|&y| y as f64);
            Some(xs.zip(chunk.iter().flatten().copied()).collect())
        })
        .collect()
}

/// the polyline with a vertex added wherever it crosses `lo` or `hi`
fn with_crossings(points: &[(f64, f64)], lo: f64, hi: f64) -> Vec<(f64, f64)> {
    let mut out = Vec::with_capacity(points.len());
    for pair in points.windows(2) {
        let ((ax, ay), (bx, by)) = (pair[0], pair[1]);
        out.push((ax, ay));
        let mut cuts: Vec<(f64, f64)> = [lo, hi]
            .iter()
            .filter(|&&level| (ay - level) * (by - level) < 0.)
            .map(|&level| ((level - ay) / (by - ay), level))
            .collect();
        cuts.sort_by(|a, b| a.0.total_cmp(&b.0));
        out.extend(cuts.into_iter().map(|(t, level)| (ax + t * (bx - ax), level)));
    }
    out.extend(points.last().copied());
    out
}

/// the parts of a polyline lying inside `lo..=hi`, cut where it leaves the range
fn clip_to_range(points: &[(f64, f64)], lo: f64, hi: f64) -> Vec<Vec<(f64, f64)>> {
    let mut parts = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    for (x, y) in with_crossings(points, lo, hi) {
        if (lo..=hi).contains(&y) {
            current.push((x, y));
        } else if !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn table(years: Vec<i32>, columns: &[(&str, Vec<Option<f64>>)]) -> GenderTable {
        GenderTable {
            years,
            columns: columns
                .iter()
                .map(|(name, v)| (name.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn trend_table() -> GenderTable {
        table(
            vec![2000, 2012, 2024],
            &[
                ("Female", vec![Some(46.1), Some(41.0), Some(30.4)]),
                ("Male", vec![Some(50.2), Some(45.5), Some(35.1)]),
                ("Total", vec![Some(48.3), Some(43.2), Some(32.8)]),
            ],
        )
    }

    /// the svg elements of one kind, e.g. every `<polyline .../>`
    fn elements<'s>(svg: &'s str, tag: &str) -> Vec<&'s str> {
        let open = format!("<{} ", tag);
        svg.match_indices(&open)
            .map(|(i, _)| {
                let rest = &svg[i..];
                &rest[..rest.find('>').map_or(rest.len(), |e| e + 1)]
            })
            .collect()
    }

    fn close(a: &[(f64, f64)], b: &[(f64, f64)]) -> bool {
        a.len() == b.len()
            && a.iter()
                .zip(b)
                .all(|(p, q)| (p.0 - q.0).abs() < 1e-9 && (p.1 - q.1).abs() < 1e-9)
    }

    #[test]
    fn segments_break_at_missing_values() {
        let years = [2000, 2001, 2002, 2003, 2004, 2005];
        let values = [Some(1.), Some(2.), None, None, Some(5.), Some(6.)];
        assert_eq!(
            segments(&years, &values),
            vec![vec![(2000., 1.), (2001., 2.)], vec![(2004., 5.), (2005., 6.)]]
        );
        assert_eq!(
            segments(&years[..3], &[None, Some(3.), None]),
            vec![vec![(2001., 3.)]]
        );
        assert!(segments(&[], &[]).is_empty());
    }

    #[test]
    fn lines_leave_the_plot_where_they_cross_the_range() {
        let points = [(0., 40.), (1., 90.), (2., 40.), (3., 10.), (4., 40.)];
        let parts = clip_to_range(&points, 25., 55.);
        assert_eq!(parts.len(), 3);
        assert!(close(&parts[0], &[(0., 40.), (0.3, 55.)]));
        assert!(close(&parts[1], &[(1.7, 55.), (2., 40.), (2.5, 25.)]));
        assert!(close(&parts[2], &[(3.5, 25.), (4., 40.)]));

        let inside = [(0., 30.), (1., 50.)];
        assert_eq!(clip_to_range(&inside, 25., 55.), vec![inside.to_vec()]);
        assert!(clip_to_range(&[(0., 60.), (1., 70.)], 25., 55.).is_empty());
        // jumping over the whole range in one step keeps the crossing part
        let across = clip_to_range(&[(0., 10.), (1., 70.)], 25., 55.);
        assert!(close(&across[0], &[(0.25, 25.), (0.75, 55.)]));
    }

    #[test]
    fn band_edge_follows_the_line_to_the_range_edge() {
        let edge = with_crossings(&[(0., 40.), (1., 90.)], 25., 55.);
        assert!(close(&edge, &[(0., 40.), (0.3, 55.), (1., 90.)]));
    }

    #[test]
    fn svg_carries_the_series_styles_and_legend() {
        let t = trend_table();
        let style = ChartStyle::default();
        let trend = TrendLines::resolve(&t, &style).unwrap();
        let svg = draw_svg(&trend, &style).unwrap();
        let lower = svg.to_lowercase();

        let polylines = elements(&lower, "polyline");
        for color in ["#2563eb", "#d946ef", "#16a34a"] {
            let stroke = format!("stroke=\"{}\"", color);
            let drawn: Vec<&&str> = polylines.iter().filter(|p| p.contains(&stroke)).collect();
            assert!(!drawn.is_empty(), "no line stroked with {}", color);
            assert!(
                drawn.iter().all(|p| p.contains("stroke-width=\"10\"")),
                "{} lines should be 10px wide: {:?}",
                color,
                drawn
            );
        }

        let band = elements(&lower, "polygon")
            .into_iter()
            .find(|p| p.contains("fill=\"#16a34a\""))
            .expect("a band filled with the total color");
        assert!(band.contains("opacity=\"0.15\""), "{}", band);

        let male = svg.find(">Male<").expect("Male legend entry");
        let female = svg.find(">Female<").expect("Female legend entry");
        let total = svg.find(">Total<").expect("Total legend entry");
        assert!(male < female && female < total, "legend order Male, Female, Total");
    }

    #[test]
    fn png_records_300_dpi() {
        let style = ChartStyle::default();
        let (w, h) = style.pixel_size();
        let rgb = vec![255u8; w as usize * h as usize * 3];
        let png = encode_png(&rgb, &style).unwrap();
        let at = png
            .windows(4)
            .position(|c| c == b"pHYs")
            .expect("pHYs chunk");
        let be = |b: &[u8]| u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        assert_eq!(be(&png[at + 4..at + 8]), 11811);
        assert_eq!(be(&png[at + 8..at + 12]), 11811);
        assert_eq!(png[at + 12], 1, "unit should be the meter");
    }

    #[test]
    fn ragged_columns_are_a_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            output_path: dir.path().join("chart.png"),
            ..Config::default()
        };
        let ragged = table(
            vec![2000, 2010],
            &[
                ("Female", vec![Some(46.1), Some(41.9)]),
                ("Male", vec![Some(50.2)]),
                ("Total", vec![Some(48.3), Some(44.2)]),
            ],
        );
        match render(&ragged, &config) {
            Err(StuntingError::Render(msg)) => {
                assert_eq!(msg, "column Male holds 1 value(s) for 2 year(s)")
            }
            other => panic!("expected a render error, got {:?}", other),
        }
        assert!(!config.output_path.exists());
    }

    #[test]
    fn missing_columns_fail_before_touching_the_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            output_path: dir.path().join("out").join("chart.png"),
            ..Config::default()
        };
        let partial = table(vec![2020], &[("Female", vec![Some(40.)]), ("Total", vec![Some(41.)])]);
        match render(&partial, &config) {
            Err(StuntingError::Render(msg)) => assert!(msg.contains("Male"), "{}", msg),
            other => panic!("expected a render error, got {:?}", other),
        }
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn empty_table_is_a_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            output_path: dir.path().join("chart.png"),
            ..Config::default()
        };
        let err = render(&GenderTable::default(), &config).unwrap_err();
        assert!(matches!(err, StuntingError::Render(_)));
        assert_eq!(
            err.to_string(),
            "cannot render: missing column(s) Male, Female, Total"
        );
        assert!(!config.output_path.exists());
    }

    #[test]
    fn single_year_widens_the_x_axis() {
        let t = table(
            vec![2020],
            &[
                ("Female", vec![Some(40.)]),
                ("Male", vec![Some(42.)]),
                ("Total", vec![Some(41.)]),
            ],
        );
        let style = ChartStyle::default();
        let trend = TrendLines::resolve(&t, &style).unwrap();
        assert_eq!(trend.x_range, (2019, 2021));
        assert_eq!(trend.lines.len(), 3);
        assert_eq!(trend.fill.0, RGBColor(0x16, 0xA3, 0x4A));
    }
}
