//! SVG rendering of prepared chart data with plotters.

use color_eyre::Result;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::chart_data::{BarChartData, BoxPlotData, HistogramData, ScatterData};

const SKY_BLUE: RGBColor = RGBColor(135, 206, 235);
const LIGHT_CORAL: RGBColor = RGBColor(240, 128, 128);
const TEAL: RGBColor = RGBColor(0, 128, 128);

/// Qualitative palette for scatter groups.
const SET1: [RGBColor; 9] = [
    RGBColor(228, 26, 28),
    RGBColor(55, 126, 184),
    RGBColor(77, 175, 74),
    RGBColor(152, 78, 163),
    RGBColor(255, 127, 0),
    RGBColor(255, 255, 51),
    RGBColor(166, 86, 40),
    RGBColor(247, 129, 191),
    RGBColor(153, 153, 153),
];

/// Width reserved right of the scatter plot for its legend.
const LEGEND_WIDTH: u32 = 160;

pub fn set1_color(idx: usize) -> RGBColor {
    SET1[idx % SET1.len()]
}

/// Widen a degenerate range so plotters has something to draw on.
fn padded_range(lo: f64, hi: f64) -> (f64, f64) {
    if hi > lo {
        let pad = hi * 0.05 - lo * 0.05;
        ((lo - pad).max(f64::MIN), (hi + pad).min(f64::MAX))
    } else {
        (lo - 0.5, hi + 0.5)
    }
}

pub fn render_histogram(data: &HistogramData, (width, height): (u32, u32)) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE)?;

        let y_max = (data.max_count as f64 * 1.05).max(1.0);
        let title = format!("Distribution of {}", data.column);
        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .caption(title.as_str(), ("sans-serif", 20))
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(data.x_min..data.x_max, 0f64..y_max)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc(data.column.as_str())
            .y_desc("Count")
            .draw()?;

        chart.draw_series(data.bins.iter().map(|b| {
            Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], SKY_BLUE.filled())
        }))?;
        chart.draw_series(data.bins.iter().map(|b| {
            Rectangle::new(
                [(b.start, 0.0), (b.end, b.count as f64)],
                BLACK.stroke_width(1),
            )
        }))?;

        root.present()?;
    }
    Ok(svg)
}

/// Horizontal box plot: box over the quartiles, whiskers, red median and outliers.
pub fn render_box_plot(data: &BoxPlotData, (width, height): (u32, u32)) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE)?;

        let (x_min, x_max) = padded_range(data.min, data.max);
        let title = format!("Boxplot of {}", data.column);
        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .caption(title.as_str(), ("sans-serif", 20))
            .x_label_area_size(40)
            .y_label_area_size(10)
            .build_cartesian_2d(x_min..x_max, 0f64..1f64)?;

        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(0)
            .x_desc(data.column.as_str())
            .draw()?;

        let (box_lo, box_hi, mid) = (0.3, 0.7, 0.5);
        let (cap_lo, cap_hi) = (0.4, 0.6);
        chart.draw_series(std::iter::once(Rectangle::new(
            [(data.q1, box_lo), (data.q3, box_hi)],
            SKY_BLUE.filled(),
        )))?;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(data.q1, box_lo), (data.q3, box_hi)],
            BLACK.stroke_width(1),
        )))?;
        let whiskers = [
            vec![(data.whisker_low, mid), (data.q1, mid)],
            vec![(data.q3, mid), (data.whisker_high, mid)],
            vec![(data.whisker_low, cap_lo), (data.whisker_low, cap_hi)],
            vec![(data.whisker_high, cap_lo), (data.whisker_high, cap_hi)],
        ];
        chart.draw_series(
            whiskers
                .into_iter()
                .map(|points| PathElement::new(points, BLACK.stroke_width(1))),
        )?;
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(data.median, box_lo), (data.median, box_hi)],
            RED.stroke_width(2),
        )))?;
        chart.draw_series(
            data.outliers
                .iter()
                .map(|&v| Circle::new((v, mid), 3, RED.filled())),
        )?;

        root.present()?;
    }
    Ok(svg)
}

/// Bars in descending count order with rotated category labels.
pub fn render_bar_chart(data: &BarChartData, (width, height): (u32, u32)) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE)?;

        let n = data.categories.len();
        let max_count = data.categories.iter().map(|(_, c)| *c).max().unwrap_or(0);
        let y_max = (max_count as f64 * 1.05).max(1.0);
        let x_min = -0.5;
        let x_max = n as f64 - 0.5;
        let title = format!("Bar Plot of {}", data.column);
        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .caption(title.as_str(), ("sans-serif", 20))
            .x_label_area_size(80)
            .y_label_area_size(50)
            .build_cartesian_2d(x_min..x_max, 0f64..y_max)?;

        let labels: Vec<String> = data.categories.iter().map(|(v, _)| v.clone()).collect();
        let label_formatter = move |v: &f64| {
            let idx = v.round();
            if (v - idx).abs() > 0.25 || idx < 0.0 {
                return String::new();
            }
            labels.get(idx as usize).cloned().unwrap_or_default()
        };
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n.max(1) * 2 + 1)
            .x_label_formatter(&label_formatter)
            .x_label_style(
                ("sans-serif", 12)
                    .into_font()
                    .transform(FontTransform::Rotate90),
            )
            .x_desc(data.column.as_str())
            .y_desc("Count")
            .draw()?;

        chart.draw_series(data.categories.iter().enumerate().map(|(i, (_, count))| {
            let x = i as f64;
            Rectangle::new([(x - 0.4, 0.0), (x + 0.4, *count as f64)], LIGHT_CORAL.filled())
        }))?;

        root.present()?;
    }
    Ok(svg)
}

/// Scatter plot; grouped points get a legend drawn in its own area right of the plot.
pub fn render_scatter(data: &ScatterData, (width, height): (u32, u32)) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE)?;

        let grouped = data.color_column.is_some();
        let (plot_area, legend_area) = if grouped && width > LEGEND_WIDTH * 2 {
            let (plot, legend) = root.split_horizontally(width - LEGEND_WIDTH);
            (plot, Some(legend))
        } else {
            (root.clone(), None)
        };

        let (x_lo, x_hi, y_lo, y_hi) = data.bounds().unwrap_or((0.0, 1.0, 0.0, 1.0));
        let (x_min, x_max) = padded_range(x_lo, x_hi);
        let (y_min, y_max) = padded_range(y_lo, y_hi);
        let title = format!("Scatter Plot: {} vs {}", data.x_column, data.y_column);
        let mut chart = ChartBuilder::on(&plot_area)
            .margin(20)
            .caption(title.as_str(), ("sans-serif", 20))
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

        chart
            .configure_mesh()
            .x_desc(data.x_column.as_str())
            .y_desc(data.y_column.as_str())
            .draw()?;

        for (idx, group) in data.groups.iter().enumerate() {
            let color = if grouped { set1_color(idx) } else { TEAL };
            chart.draw_series(
                group
                    .points
                    .iter()
                    .map(|&p| Circle::new(p, 3, color.mix(0.7).filled())),
            )?;
        }

        if let (Some(legend), Some(column)) = (legend_area, data.color_column.as_deref()) {
            let title_style = ("sans-serif", 14)
                .into_font()
                .style(FontStyle::Bold)
                .color(&BLACK)
                .pos(Pos::new(HPos::Left, VPos::Center));
            legend.draw(&Text::new(column.to_string(), (10, 40), title_style))?;
            let item_style = ("sans-serif", 12)
                .into_font()
                .color(&BLACK)
                .pos(Pos::new(HPos::Left, VPos::Center));
            for (idx, group) in data.groups.iter().enumerate() {
                let y = 62 + idx as i32 * 20;
                legend.draw(&Circle::new((16, y), 5, set1_color(idx).filled()))?;
                let label = group.label.clone().unwrap_or_default();
                legend.draw(&Text::new(label, (28, y), item_style.clone()))?;
            }
        }

        root.present()?;
    }
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart_data::{histogram, ScatterGroup};

    #[test]
    fn histogram_svg_has_title() {
        let data = HistogramData {
            column: "age".into(),
            bins: histogram(&[1.0, 2.0, 2.5, 4.0], 30).unwrap(),
            x_min: 1.0,
            x_max: 4.0,
            max_count: 1,
        };
        let svg = render_histogram(&data, (800, 400)).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("Distribution of age"));
    }

    #[test]
    fn padded_range_stays_finite_near_the_float_limit() {
        let bins = histogram(&[-1e308, 0.0, 1e308], 30).unwrap();
        let (lo, hi) = padded_range(bins[0].start, bins[29].end);
        assert!(lo.is_finite() && hi.is_finite());
        assert!(lo < -1e308 && hi > 1e308);

        let (lo, hi) = padded_range(-f64::MAX, f64::MAX);
        assert_eq!((lo, hi), (f64::MIN, f64::MAX));
    }

    #[test]
    fn bar_chart_svg_lists_categories() {
        let data = BarChartData {
            column: "color".into(),
            categories: vec![("red".into(), 3), ("blue".into(), 1)],
        };
        let svg = render_bar_chart(&data, (800, 400)).unwrap();
        assert!(svg.contains("Bar Plot of color"));
        assert!(svg.contains("red"));
        assert!(svg.contains("blue"));
    }

    #[test]
    fn grouped_scatter_draws_legend() {
        let data = ScatterData {
            x_column: "x".into(),
            y_column: "y".into(),
            color_column: Some("kind".into()),
            groups: vec![
                ScatterGroup {
                    label: Some("alpha".into()),
                    points: vec![(1.0, 2.0)],
                },
                ScatterGroup {
                    label: Some("beta".into()),
                    points: vec![(2.0, 3.0)],
                },
            ],
        };
        let svg = render_scatter(&data, (800, 400)).unwrap();
        assert!(svg.contains("Scatter Plot: x vs y"));
        assert!(svg.contains("kind"));
        assert!(svg.contains("alpha"));
        assert!(svg.contains("beta"));
    }

    #[test]
    fn box_plot_renders_single_value() {
        let data = BoxPlotData {
            column: "v".into(),
            q1: 2.0,
            median: 2.0,
            q3: 2.0,
            whisker_low: 2.0,
            whisker_high: 2.0,
            outliers: vec![],
            min: 2.0,
            max: 2.0,
        };
        let svg = render_box_plot(&data, (800, 200)).unwrap();
        assert!(svg.contains("Boxplot of v"));
    }

    #[test]
    fn set1_cycles() {
        assert_eq!(set1_color(0), set1_color(9));
    }
}
