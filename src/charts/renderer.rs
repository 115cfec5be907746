//! Static Chart Renderer
//! Draws line, bar, grouped bar, histogram and correlation heatmap charts
//! to PNG or SVG files with plotters.
//!
//! The backend follows the file extension: `.svg` uses the SVG backend,
//! anything else is encoded as a bitmap.

use crate::charts::{ChartData, ChartError, ChartSpec};
use crate::data::columns::days_to_date;
use crate::stats::SeasonalityResult;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use polars::prelude::DataFrame;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const LINE_COLOR: RGBColor = RGBColor(91, 155, 213);
const GRID_COLOR: RGBColor = RGBColor(200, 200, 200);

pub const PALETTE: [RGBColor; 6] = [
    RGBColor(91, 155, 213),  // Blue
    RGBColor(237, 125, 49),  // Orange
    RGBColor(112, 173, 71),  // Green
    RGBColor(155, 89, 182),  // Purple
    RGBColor(26, 188, 156),  // Teal
    RGBColor(96, 125, 139),  // Blue Grey
];

const CAPTION_FONT: (&str, u32) = ("sans-serif", 24);
const MISSING_CELL: RGBColor = RGBColor(220, 220, 220);
const POSITIVE: RGBColor = RGBColor(214, 39, 40);
const NEGATIVE: RGBColor = RGBColor(31, 119, 180);

/// Diverging white-centred scale for a coefficient in [-1, 1].
fn correlation_color(r: f64) -> RGBColor {
    if !r.is_finite() {
        return MISSING_CELL;
    }
    let (end, t) = if r >= 0.0 {
        (POSITIVE, r.min(1.0))
    } else {
        (NEGATIVE, (-r).min(1.0))
    };
    let blend = |c: u8| (255.0 + (c as f64 - 255.0) * t).round() as u8;
    RGBColor(blend(end.0), blend(end.1), blend(end.2))
}

fn draw_err<E: std::error::Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> ChartError {
    ChartError::Draw(err.to_string())
}

/// Writes chart files into one output directory.
pub struct ChartRenderer {
    output_dir: PathBuf,
    width: u32,
    height: u32,
}

impl ChartRenderer {
    /// Create the renderer, creating `output_dir` if needed.
    pub fn new(
        output_dir: impl Into<PathBuf>,
        width: u32,
        height: u32,
    ) -> Result<Self, ChartError> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir,
            width,
            height,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render `spec` from `df` into `file_name` below the output directory.
    pub fn render(
        &self,
        spec: &ChartSpec,
        df: &DataFrame,
        file_name: &str,
    ) -> Result<PathBuf, ChartError> {
        let data = ChartData::from_table(spec, df)?;
        let (x_desc, y_desc) = spec.axis_labels();
        self.render_data(&data, spec.title(), &x_desc, &y_desc, file_name)
    }

    /// Bar chart of the monthly averages of a seasonality profile.
    pub fn render_seasonal(
        &self,
        result: &SeasonalityResult,
        title: &str,
        file_name: &str,
    ) -> Result<PathBuf, ChartError> {
        let data = ChartData::from_seasonality(result)?;
        self.render_data(&data, title, "Month", "Average", file_name)
    }

    fn render_data(
        &self,
        data: &ChartData,
        title: &str,
        x_desc: &str,
        y_desc: &str,
        file_name: &str,
    ) -> Result<PathBuf, ChartError> {
        let path = self.output_dir.join(file_name);
        let is_svg = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("svg"));

        if is_svg {
            let root = SVGBackend::new(&path, (self.width, self.height)).into_drawing_area();
            Self::draw(root, data, title, x_desc, y_desc)?;
        } else {
            let root = BitMapBackend::new(&path, (self.width, self.height)).into_drawing_area();
            Self::draw(root, data, title, x_desc, y_desc)?;
        }

        info!("Chart saved: {}", path.display());
        Ok(path)
    }

    fn draw<DB: DrawingBackend>(
        root: DrawingArea<DB, Shift>,
        data: &ChartData,
        title: &str,
        x_desc: &str,
        y_desc: &str,
    ) -> Result<(), ChartError> {
        root.fill(&WHITE).map_err(draw_err)?;
        match data {
            ChartData::Series(points) => {
                Self::draw_series(&root, data, points, title, x_desc, y_desc)?
            }
            ChartData::Bars { labels, values } => {
                Self::draw_bars(&root, data, labels, values, title, x_desc, y_desc)?
            }
            ChartData::Histogram(bins) => {
                let x_min = bins.first().map(|b| b.start).unwrap_or(0.0);
                let x_max = bins.last().map(|b| b.end).unwrap_or(1.0);
                let (_, y_max) = data.y_range();

                let mut chart = ChartBuilder::on(&root)
                    .caption(title, CAPTION_FONT)
                    .margin(15)
                    .x_label_area_size(45)
                    .y_label_area_size(70)
                    .build_cartesian_2d(x_min..x_max, 0f64..y_max)
                    .map_err(draw_err)?;
                chart
                    .configure_mesh()
                    .x_desc(x_desc)
                    .y_desc(y_desc)
                    .draw()
                    .map_err(draw_err)?;
                chart
                    .draw_series(bins.iter().map(|b| {
                        Rectangle::new(
                            [(b.start, 0.0), (b.end, b.count as f64)],
                            PALETTE[0].mix(0.7).filled(),
                        )
                    }))
                    .map_err(draw_err)?;
            }
            ChartData::Matrix { labels, values } => {
                Self::draw_heatmap(&root, labels, values, title)?
            }
            ChartData::Groups {
                categories,
                series,
                values,
            } => Self::draw_grouped(
                &root, data, categories, series, values, title, x_desc, y_desc,
            )?,
        }
        root.present().map_err(draw_err)?;
        Ok(())
    }

    fn draw_series<DB: DrawingBackend>(
        root: &DrawingArea<DB, Shift>,
        data: &ChartData,
        points: &[(f64, f64)],
        title: &str,
        x_desc: &str,
        y_desc: &str,
    ) -> Result<(), ChartError> {
        let x_min = points.first().map(|p| p.0).unwrap_or(0.0);
        let mut x_max = points.last().map(|p| p.0).unwrap_or(1.0);
        if x_max <= x_min {
            x_max = x_min + 1.0;
        }
        let (y_min, y_max) = data.y_range();

        let mut chart = ChartBuilder::on(root)
            .caption(title, CAPTION_FONT)
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(70)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)
            .map_err(draw_err)?;

        let format_day = |x: &f64| {
            days_to_date(x.round() as i32)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        };
        chart
            .configure_mesh()
            .x_labels(8)
            .x_label_formatter(&format_day)
            .x_desc(x_desc)
            .y_desc(y_desc)
            .axis_style(GRID_COLOR.stroke_width(1))
            .draw()
            .map_err(draw_err)?;

        chart
            .draw_series(LineSeries::new(
                points.iter().copied(),
                LINE_COLOR.stroke_width(2),
            ))
            .map_err(draw_err)?;
        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 3, LINE_COLOR.filled())),
            )
            .map_err(draw_err)?;
        Ok(())
    }

    fn draw_bars<DB: DrawingBackend>(
        root: &DrawingArea<DB, Shift>,
        data: &ChartData,
        labels: &[String],
        values: &[f64],
        title: &str,
        x_desc: &str,
        y_desc: &str,
    ) -> Result<(), ChartError> {
        let n = labels.len() as u32;
        let (y_min, y_max) = data.y_range();

        let mut chart = ChartBuilder::on(root)
            .caption(title, CAPTION_FONT)
            .margin(15)
            .x_label_area_size(60)
            .y_label_area_size(70)
            .build_cartesian_2d((0u32..n).into_segmented(), y_min..y_max)
            .map_err(draw_err)?;

        let label_of = |v: &SegmentValue<u32>| match v {
            SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
            _ => String::new(),
        };
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(labels.len())
            .x_label_formatter(&label_of)
            .x_desc(x_desc)
            .y_desc(y_desc)
            .draw()
            .map_err(draw_err)?;

        chart
            .draw_series(values.iter().enumerate().map(|(i, &v)| {
                let i = i as u32;
                let mut bar = Rectangle::new(
                    [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), v)],
                    PALETTE[i as usize % PALETTE.len()].filled(),
                );
                bar.set_margin(0, 0, 6, 6);
                bar
            }))
            .map_err(draw_err)?;
        Ok(())
    }

    fn draw_heatmap<DB: DrawingBackend>(
        root: &DrawingArea<DB, Shift>,
        labels: &[String],
        values: &[Vec<f64>],
        title: &str,
    ) -> Result<(), ChartError> {
        let n = labels.len() as u32;
        let mut chart = ChartBuilder::on(root)
            .caption(title, CAPTION_FONT)
            .margin(15)
            .x_label_area_size(60)
            .y_label_area_size(120)
            .build_cartesian_2d((0u32..n).into_segmented(), (0u32..n).into_segmented())
            .map_err(draw_err)?;

        let label_of = |v: &SegmentValue<u32>| match v {
            SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
            _ => String::new(),
        };
        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(labels.len())
            .y_labels(labels.len())
            .x_label_formatter(&label_of)
            .y_label_formatter(&label_of)
            .draw()
            .map_err(draw_err)?;

        let cells: Vec<(u32, u32, f64)> = values
            .iter()
            .enumerate()
            .flat_map(|(i, row)| {
                row.iter()
                    .enumerate()
                    .map(move |(j, &r)| (i as u32, j as u32, r))
            })
            .collect();
        chart
            .draw_series(cells.iter().map(|&(i, j, r)| {
                Rectangle::new(
                    [
                        (SegmentValue::Exact(j), SegmentValue::Exact(i)),
                        (SegmentValue::Exact(j + 1), SegmentValue::Exact(i + 1)),
                    ],
                    correlation_color(r).filled(),
                )
            }))
            .map_err(draw_err)?;

        let cell_font = TextStyle::from(("sans-serif", 16).into_font())
            .pos(Pos::new(HPos::Center, VPos::Center));
        chart
            .draw_series(cells.iter().filter(|c| c.2.is_finite()).map(|&(i, j, r)| {
                Text::new(
                    format!("{:.2}", r),
                    (SegmentValue::CenterOf(j), SegmentValue::CenterOf(i)),
                    cell_font.clone(),
                )
            }))
            .map_err(draw_err)?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_grouped<DB: DrawingBackend>(
        root: &DrawingArea<DB, Shift>,
        data: &ChartData,
        categories: &[String],
        series: &[String],
        values: &[Vec<f64>],
        title: &str,
        x_desc: &str,
        y_desc: &str,
    ) -> Result<(), ChartError> {
        let n = categories.len();
        let (y_min, y_max) = data.y_range();
        let key_points: Vec<f64> = (0..n).map(|i| i as f64 + 0.5).collect();

        let mut chart = ChartBuilder::on(root)
            .caption(title, CAPTION_FONT)
            .margin(15)
            .x_label_area_size(60)
            .y_label_area_size(70)
            .build_cartesian_2d((0f64..n as f64).with_key_points(key_points), y_min..y_max)
            .map_err(draw_err)?;

        let label_of = |x: &f64| {
            categories
                .get(x.floor().max(0.0) as usize)
                .cloned()
                .unwrap_or_default()
        };
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_label_formatter(&label_of)
            .x_desc(x_desc)
            .y_desc(y_desc)
            .draw()
            .map_err(draw_err)?;

        // Bars of one category share 80% of its slot
        let width = 0.8 / series.len().max(1) as f64;
        for (s, (name, sums)) in series.iter().zip(values).enumerate() {
            let color = PALETTE[s % PALETTE.len()];
            let offset = 0.1 + s as f64 * width;
            chart
                .draw_series(sums.iter().enumerate().map(|(c, &v)| {
                    let x0 = c as f64 + offset;
                    Rectangle::new([(x0, 0.0), (x0 + width, v)], color.filled())
                }))
                .map_err(draw_err)?
                .label(name.as_str())
                .legend(move |(x, y)| {
                    Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled())
                });
        }
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(draw_err)?;
        Ok(())
    }
}
