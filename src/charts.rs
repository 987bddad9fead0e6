// Static chart rendering.
//
// Every chart is written as a PNG into the renderer's output directory. The
// renderer only draws what the report functions computed; it never
// aggregates on its own.

use crate::error::ChartError;
use crate::types::{Crosstab, GroupValue, MonthlyCount, Share};
use crate::util::format_number;
use plotters::coord::ranged1d::SegmentValue;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::f64::consts::{FRAC_PI_2, TAU};
use std::path::{Path, PathBuf};
use tracing::debug;

const FONT: &str = "sans-serif";
const SIZE: (u32, u32) = (1000, 600);

// Sequential scale for the heatmap, light to dark.
const HEAT_LOW: (u8, u8, u8) = (255, 255, 217);
const HEAT_MID: (u8, u8, u8) = (65, 182, 196);
const HEAT_HIGH: (u8, u8, u8) = (8, 29, 88);

pub struct ChartRenderer {
    out_dir: PathBuf,
}

impl ChartRenderer {
    pub fn new(out_dir: &Path) -> Result<Self, ChartError> {
        std::fs::create_dir_all(out_dir)?;
        Ok(Self {
            out_dir: out_dir.to_path_buf(),
        })
    }

    fn path(&self, file: &str) -> PathBuf {
        self.out_dir.join(file)
    }

    /// Open a white canvas, hand it to `draw`, and flush it to `file`.
    fn render<F>(&self, file: &str, size: (u32, u32), draw: F) -> Result<PathBuf, ChartError>
    where
        F: FnOnce(&DrawingArea<BitMapBackend<'_>, Shift>) -> Result<(), ChartError>,
    {
        let path = self.path(file);
        {
            let root = BitMapBackend::new(&path, size).into_drawing_area();
            root.fill(&WHITE)?;
            draw(&root)?;
            root.present()?;
        }
        debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// Stacked bars, one bar per plan, one stack segment per gender.
    pub fn gender_by_plan(&self, table: &Crosstab) -> Result<PathBuf, ChartError> {
        self.render("gender_by_plan.png", SIZE, |root| {
            let plans: Vec<&str> = table.rows.iter().map(|(k, _)| k.as_str()).collect();
            let mut chart = ChartBuilder::on(root)
                .caption("Gender Distribution by Subscription Plan", (FONT, 28))
                .margin(20)
                .x_label_area_size(40)
                .y_label_area_size(60)
                .build_cartesian_2d((0..plans.len()).into_segmented(), 0.0..100.0)?;
            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_labels(plans.len())
                .x_label_formatter(&|v| segment_label(v, &plans))
                .x_desc("Subscription Type")
                .y_desc("Percentage")
                .draw()?;

            let mut base = vec![0.0; plans.len()];
            for (col, gender) in table.columns.iter().enumerate() {
                let color = Palette99::pick(col).to_rgba();
                let bars: Vec<Rectangle<(SegmentValue<usize>, f64)>> = table
                    .rows
                    .iter()
                    .enumerate()
                    .map(|(i, (_, values))| {
                        let bottom = base[i];
                        let top = bottom + finite_or_zero(values[col]);
                        base[i] = top;
                        let mut bar = Rectangle::new(
                            [(SegmentValue::Exact(i), bottom), (SegmentValue::Exact(i + 1), top)],
                            color.filled(),
                        );
                        bar.set_margin(0, 0, 15, 15);
                        bar
                    })
                    .collect();
                chart
                    .draw_series(bars)?
                    .label(gender.as_str())
                    .legend(move |(x, y)| {
                        Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled())
                    });
            }
            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;

            Ok(())
        })
    }

    pub fn users_by_country(&self, shares: &[Share]) -> Result<PathBuf, ChartError> {
        let bars: Vec<(String, f64)> = shares
            .iter()
            .map(|s| (s.group.clone(), s.percent))
            .collect();
        self.bar_chart(
            "users_by_country.png",
            "Percentage of Users by Country",
            ("Country", "Percentage"),
            &bars,
            None,
        )
    }

    /// Bars labelled with the dollar total on top.
    pub fn revenue_by_plan(&self, revenue: &[GroupValue]) -> Result<PathBuf, ChartError> {
        let bars: Vec<(String, f64)> = revenue.iter().map(|v| (v.group.clone(), v.value)).collect();
        self.bar_chart(
            "revenue_by_plan.png",
            "Monthly Revenue by Subscription Type",
            ("Subscription Type", "Total Monthly Revenue"),
            &bars,
            Some(&|v: f64| format!("${}", format_number(v, 0))),
        )
    }

    fn bar_chart(
        &self,
        file: &str,
        title: &str,
        (x_desc, y_desc): (&str, &str),
        bars: &[(String, f64)],
        value_label: Option<&dyn Fn(f64) -> String>,
    ) -> Result<PathBuf, ChartError> {
        self.render(file, SIZE, |root| {
            let labels: Vec<&str> = bars.iter().map(|(k, _)| k.as_str()).collect();
            let y_max = axis_max(bars.iter().map(|(_, v)| *v));
            let mut chart = ChartBuilder::on(root)
                .caption(title, (FONT, 28))
                .margin(20)
                .x_label_area_size(50)
                .y_label_area_size(80)
                .build_cartesian_2d((0..labels.len()).into_segmented(), 0.0..y_max)?;
            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_labels(labels.len())
                .x_label_formatter(&|v| segment_label(v, &labels))
                .x_desc(x_desc)
                .y_desc(y_desc)
                .draw()?;

            let color = Palette99::pick(0).to_rgba();
            chart.draw_series(bars.iter().enumerate().map(|(i, (_, v))| {
                let mut bar = Rectangle::new(
                    [
                        (SegmentValue::Exact(i), 0.0),
                        (SegmentValue::Exact(i + 1), finite_or_zero(*v)),
                    ],
                    color.filled(),
                );
                bar.set_margin(0, 0, 10, 10);
                bar
            }))?;

            if let Some(fmt) = value_label {
                let style = (FONT, 16)
                    .into_font()
                    .color(&BLACK)
                    .pos(Pos::new(HPos::Center, VPos::Bottom));
                chart.draw_series(bars.iter().enumerate().map(|(i, (_, v))| {
                    Text::new(
                        fmt(*v),
                        (SegmentValue::CenterOf(i), finite_or_zero(*v)),
                        style.clone(),
                    )
                }))?;
            }

            Ok(())
        })
    }

    pub fn signup_trends(&self, months: &[MonthlyCount]) -> Result<PathBuf, ChartError> {
        self.render("signup_trends.png", (1200, 600), |root| {
            let labels: Vec<String> = months.iter().map(|m| m.month.to_string()).collect();
            let y_max = axis_max(months.iter().map(|m| m.signups as f64));
            let x_max = labels.len().saturating_sub(1).max(1);
            let mut chart = ChartBuilder::on(root)
                .caption("User Sign-up Trends Over Time", (FONT, 28))
                .margin(20)
                .x_label_area_size(60)
                .y_label_area_size(60)
                .build_cartesian_2d(0..x_max, 0.0..y_max)?;
            chart
                .configure_mesh()
                .x_labels(labels.len().clamp(1, 24))
                .x_label_formatter(&|i| labels.get(*i).cloned().unwrap_or_default())
                .x_desc("Month")
                .y_desc("Number of Sign-ups")
                .draw()?;

            chart.draw_series(LineSeries::new(
                months.iter().enumerate().map(|(i, m)| (i, m.signups as f64)),
                &BLUE,
            ))?;

            Ok(())
        })
    }

    /// Donut of subscriber counts per plan, starting at twelve o'clock.
    pub fn subscribers_by_plan(&self, shares: &[Share]) -> Result<PathBuf, ChartError> {
        self.render("subscribers_by_plan.png", (800, 800), |root| {
            let root = root.titled("Distribution of Subscribers by Subscription Plan", (FONT, 28))?;

            let (w, h) = root.dim_in_pixel();
            let center = (w as f64 / 2.0, h as f64 / 2.0);
            let outer = w.min(h) as f64 * 0.35;
            let inner = outer * 0.7;

            let counts: Vec<f64> = shares.iter().map(|s| s.count as f64).collect();
            let total: f64 = counts.iter().sum();
            let label_style = (FONT, 18)
                .into_font()
                .color(&BLACK)
                .pos(Pos::new(HPos::Center, VPos::Center));

            let slices = slice_angles(&counts);
            for (i, ((start, end), share)) in slices.into_iter().zip(shares).enumerate() {
                let color = Palette99::pick(i).to_rgba();
                root.draw(&Polygon::new(arc_points(center, outer, start, end), color.filled()))?;

                let mid = (start + end) / 2.0;
                let pct = format!("{:.1}%", share.count as f64 / total * 100.0);
                root.draw(&Text::new(
                    pct,
                    polar(center, (outer + inner) / 2.0, mid),
                    label_style.clone(),
                ))?;
                root.draw(&Text::new(
                    share.group.clone(),
                    polar(center, outer * 1.15, mid),
                    label_style.clone(),
                ))?;
            }
            let hole = (center.0 as i32, center.1 as i32);
            root.draw(&Circle::new(hole, inner as i32, WHITE.filled()))?;

            Ok(())
        })
    }

    /// Device x plan heatmap annotated with row percentages.
    pub fn device_plan_heatmap(&self, table: &Crosstab) -> Result<PathBuf, ChartError> {
        self.render("device_plan_heatmap.png", (1200, 800), |root| {
            let plans: Vec<&str> = table.columns.iter().map(String::as_str).collect();
            let devices: Vec<&str> = table.rows.iter().map(|(k, _)| k.as_str()).collect();
            let mut chart = ChartBuilder::on(root)
                .caption("Correlation between Device Type and Subscription Plan", (FONT, 28))
                .margin(20)
                .x_label_area_size(50)
                .y_label_area_size(100)
                .build_cartesian_2d(
                    (0..plans.len()).into_segmented(),
                    (0..devices.len()).into_segmented(),
                )?;
            chart
                .configure_mesh()
                .disable_mesh()
                .x_labels(plans.len())
                .y_labels(devices.len())
                .x_label_formatter(&|v| segment_label(v, &plans))
                .y_label_formatter(&|v| segment_label(v, &devices))
                .x_desc("Subscription Type")
                .y_desc("Device Type")
                .draw()?;

            let cells: Vec<(usize, usize, f64)> = table
                .rows
                .iter()
                .enumerate()
                .flat_map(|(y, (_, values))| {
                    values.iter().enumerate().map(move |(x, v)| (x, y, *v))
                })
                .collect();

            chart.draw_series(cells.iter().map(|&(x, y, v)| {
                Rectangle::new(
                    [
                        (SegmentValue::Exact(x), SegmentValue::Exact(y)),
                        (SegmentValue::Exact(x + 1), SegmentValue::Exact(y + 1)),
                    ],
                    heat_color(v).filled(),
                )
            }))?;
            chart.draw_series(cells.iter().map(|&(x, y, v)| {
                let ink = if v > 0.5 { WHITE } else { BLACK };
                let style = (FONT, 18)
                    .into_font()
                    .color(&ink)
                    .pos(Pos::new(HPos::Center, VPos::Center));
                Text::new(
                    format!("{:.2}%", v * 100.0),
                    (SegmentValue::CenterOf(x), SegmentValue::CenterOf(y)),
                    style,
                )
            }))?;

            Ok(())
        })
    }
}

fn segment_label(v: &SegmentValue<usize>, labels: &[&str]) -> String {
    match v {
        SegmentValue::CenterOf(i) => labels.get(*i).map(|s| s.to_string()).unwrap_or_default(),
        _ => String::new(),
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Top of the value axis: 10% headroom over the largest finite value.
fn axis_max(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.filter(|v| v.is_finite()).fold(0.0_f64, f64::max);
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

/// Start and end angle (radians, counter-clockwise) of each slice, the first
/// slice starting at the top.
pub fn slice_angles(values: &[f64]) -> Vec<(f64, f64)> {
    let total: f64 = values.iter().filter(|v| v.is_finite()).sum();
    if total <= 0.0 {
        return Vec::new();
    }
    let mut start = FRAC_PI_2;
    values
        .iter()
        .map(|v| {
            let end = start + finite_or_zero(*v) / total * TAU;
            let slice = (start, end);
            start = end;
            slice
        })
        .collect()
}

fn polar(center: (f64, f64), radius: f64, angle: f64) -> (i32, i32) {
    // Screen y grows downwards.
    (
        (center.0 + radius * angle.cos()).round() as i32,
        (center.1 - radius * angle.sin()).round() as i32,
    )
}

fn arc_points(center: (f64, f64), radius: f64, start: f64, end: f64) -> Vec<(i32, i32)> {
    let steps = (((end - start) / TAU) * 180.0).ceil().max(1.0) as usize;
    let mut points = vec![polar(center, 0.0, 0.0)];
    points.extend((0..=steps).map(|i| {
        let a = start + (end - start) * i as f64 / steps as f64;
        polar(center, radius, a)
    }));
    points
}

/// Map a fraction in `0..=1` onto the sequential heatmap scale.
pub fn heat_color(v: f64) -> RGBColor {
    let v = finite_or_zero(v).clamp(0.0, 1.0);
    let (from, to, t) = if v < 0.5 {
        (HEAT_LOW, HEAT_MID, v * 2.0)
    } else {
        (HEAT_MID, HEAT_HIGH, (v - 0.5) * 2.0)
    };
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(lerp(from.0, to.0), lerp(from.1, to.1), lerp(from.2, to.2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports;
    use crate::types::SubscriptionRecord;
    use chrono::NaiveDate;

    #[test]
    fn slices_cover_the_full_circle_from_the_top() {
        let slices = slice_angles(&[1.0, 1.0, 2.0]);
        assert_eq!(slices.len(), 3);
        assert!((slices[0].0 - FRAC_PI_2).abs() < 1e-12);
        assert!((slices[1].0 - slices[0].1).abs() < 1e-12);
        assert!((slices[2].1 - slices[0].0 - TAU).abs() < 1e-9);
        // The last slice holds half the total.
        assert!((slices[2].1 - slices[2].0 - TAU / 2.0).abs() < 1e-9);
        assert!(slice_angles(&[0.0, 0.0]).is_empty());
    }

    #[test]
    fn heat_scale_endpoints() {
        assert_eq!(heat_color(0.0), RGBColor(255, 255, 217));
        assert_eq!(heat_color(0.5), RGBColor(65, 182, 196));
        assert_eq!(heat_color(1.0), RGBColor(8, 29, 88));
        assert_eq!(heat_color(f64::NAN), heat_color(0.0));
        assert_eq!(heat_color(7.0), heat_color(1.0));
    }

    #[test]
    fn axis_leaves_headroom() {
        assert!((axis_max([10.0, 20.0].into_iter()) - 22.0).abs() < 1e-9);
        assert_eq!(axis_max([f64::NAN].into_iter()), 1.0);
        assert_eq!(axis_max(std::iter::empty()), 1.0);
    }

    #[test]
    fn segment_labels_only_at_centers() {
        let labels = ["Basic", "Premium"];
        assert_eq!(segment_label(&SegmentValue::CenterOf(1), &labels), "Premium");
        assert_eq!(segment_label(&SegmentValue::Exact(1), &labels), "");
        assert_eq!(segment_label(&SegmentValue::CenterOf(5), &labels), "");
    }

    #[test]
    fn renderer_creates_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/charts");
        let renderer = ChartRenderer::new(&out).unwrap();
        assert!(out.is_dir());
        assert_eq!(renderer.path("x.png"), out.join("x.png"));
    }

    fn record(plan: &str, device: &str, gender: &str, joined: &str) -> SubscriptionRecord {
        let join_date = NaiveDate::parse_from_str(joined, "%Y-%m-%d").unwrap();
        SubscriptionRecord {
            user_id: None,
            subscription_type: plan.into(),
            monthly_revenue: 12.0,
            join_date,
            last_payment_date: join_date + chrono::Duration::days(60),
            country: "Spain".into(),
            age: 30,
            gender: gender.into(),
            device: device.into(),
        }
    }

    fn render_all(renderer: &ChartRenderer, data: &[SubscriptionRecord]) -> Vec<PathBuf> {
        vec![
            renderer.gender_by_plan(&reports::gender_distribution_by_plan(data)),
            renderer.users_by_country(&reports::users_by_country(data)),
            renderer.revenue_by_plan(&reports::revenue_by_plan(data)),
            renderer.subscribers_by_plan(&reports::subscribers_by_plan(data)),
            renderer.device_plan_heatmap(&reports::device_plan_crosstab(data)),
            renderer.signup_trends(&reports::monthly_signups(data)),
        ]
        .into_iter()
        .map(|result| result.unwrap())
        .collect()
    }

    #[test]
    fn every_chart_is_written_for_report_results() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ChartRenderer::new(dir.path()).unwrap();
        let data = vec![
            record("Basic", "Laptop", "Male", "2022-01-15"),
            record("Premium", "Smart TV", "Female", "2022-02-03"),
            record("Premium", "Laptop", "Female", "2022-03-20"),
        ];
        let paths = render_all(&renderer, &data);
        assert_eq!(paths.len(), 6);
        for path in paths {
            assert!(path.is_file(), "{} was not written", path.display());
        }
    }

    #[test]
    fn empty_dataset_still_renders_every_chart() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ChartRenderer::new(dir.path()).unwrap();
        for path in render_all(&renderer, &[]) {
            assert!(path.is_file(), "{} was not written", path.display());
        }
    }

    #[test]
    fn signup_trend_of_no_months_is_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ChartRenderer::new(dir.path()).unwrap();
        let path = renderer.signup_trends(&[]).unwrap();
        assert_eq!(path, dir.path().join("signup_trends.png"));
    }
}
