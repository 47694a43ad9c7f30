//! Price history chart
//!
//! The chart is drawn through the [`Surface`] trait so the layout logic can
//! be tested against a recording surface and rendered to SVG for the API and
//! CLI. Coordinates are in pixels with the origin at the top left.
//!
//! ```text
//!   $12.10 ┤─────────────────────────  gridlines (5)
//!          │        ●
//!          │      ╱   ╲
//!   $8.10  ┤ ●──╱       ╲──●
//!          └──────────────────────
//!           Jan 1   Jan 15   Feb 2    labels (first/middle/last)
//! ```

use std::fmt::Write as _;

use chrono::{Datelike, NaiveDate};

use crate::history::PriceHistory;

pub const GRID_COLOR: &str = "#e5e7eb";
pub const AXIS_COLOR: &str = "#9ca3af";
pub const LABEL_COLOR: &str = "#6b7280";
pub const SERIES_COLOR: &str = "#2563eb";
pub const POINT_CENTER_COLOR: &str = "white";

/// Number of horizontal gridlines
pub const GRIDLINES: usize = 5;

pub const POINT_RADIUS: f64 = 5.0;
pub const POINT_CENTER_RADIUS: f64 = 2.0;

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 320;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: &'static str,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub color: &'static str,
    pub size: f64,
    pub anchor: Anchor,
}

/// 2D drawing primitives a chart needs
pub trait Surface {
    fn line(&mut self, from: Point, to: Point, stroke: Stroke);
    fn polyline(&mut self, points: &[Point], stroke: Stroke);
    /// Filled circle
    fn circle(&mut self, center: Point, radius: f64, fill: &'static str);
    fn text(&mut self, at: Point, text: &str, style: TextStyle);
}

/// Maps a domain interval onto a pixel range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    domain_min: f64,
    domain_width: f64,
    range_start: f64,
    range_end: f64,
}

impl LinearScale {
    /// A zero-width domain is widened to 1 so every value maps to `range_start`
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        let width = domain.1 - domain.0;
        Self {
            domain_min: domain.0,
            domain_width: if width == 0.0 { 1.0 } else { width },
            range_start: range.0,
            range_end: range.1,
        }
    }

    pub fn map(&self, value: f64) -> f64 {
        let t = (value - self.domain_min) / self.domain_width;
        self.range_start + t * (self.range_end - self.range_start)
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.domain_min, self.domain_min + self.domain_width)
    }
}

/// Space around the plot area for labels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Padding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for Padding {
    fn default() -> Self {
        Self {
            top: 20.0,
            right: 20.0,
            bottom: 40.0,
            left: 60.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartLayout {
    pub width: f64,
    pub height: f64,
    pub padding: Padding,
}

impl ChartLayout {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as f64,
            height: height as f64,
            padding: Padding::default(),
        }
    }

    pub fn plot_left(&self) -> f64 {
        self.padding.left
    }

    pub fn plot_right(&self) -> f64 {
        self.width - self.padding.right
    }

    pub fn plot_top(&self) -> f64 {
        self.padding.top
    }

    pub fn plot_bottom(&self) -> f64 {
        self.height - self.padding.bottom
    }

    pub fn plot_height(&self) -> f64 {
        self.plot_bottom() - self.plot_top()
    }
}

fn days(date: NaiveDate) -> f64 {
    date.num_days_from_ce() as f64
}

/// Short x-axis date label, e.g. "Mar 7"
pub fn date_label(date: NaiveDate) -> String {
    date.format("%b %-d").to_string()
}

/// Which points get an x-axis label
pub fn label_indices(count: usize) -> Vec<usize> {
    match count {
        0 => Vec::new(),
        1..=3 => (0..count).collect(),
        _ => vec![0, count / 2, count - 1],
    }
}

/// Draw a price history onto `surface`. Draws nothing when there are no points.
pub fn render_price_chart<S: Surface + ?Sized>(
    surface: &mut S,
    history: &PriceHistory,
    layout: ChartLayout,
) {
    let points = &history.points;
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return;
    };

    let x_scale = LinearScale::new(
        (days(first.date), days(last.date)),
        (layout.plot_left(), layout.plot_right()),
    );
    let (lo, hi) = history.price_range();
    // Screen y grows downward, so the range is inverted
    let y_scale = LinearScale::new(
        (lo * 0.9, hi * 1.1),
        (layout.plot_bottom(), layout.plot_top()),
    );
    let (price_min, price_max) = y_scale.domain();

    let grid = Stroke {
        color: GRID_COLOR,
        width: 1.0,
    };
    let y_label = TextStyle {
        color: LABEL_COLOR,
        size: 12.0,
        anchor: Anchor::End,
    };
    let intervals = (GRIDLINES - 1) as f64;
    for i in 0..GRIDLINES {
        let y = layout.plot_top() + layout.plot_height() / intervals * i as f64;
        surface.line(
            Point::new(layout.plot_left(), y),
            Point::new(layout.plot_right(), y),
            grid,
        );
        let price = price_max - (price_max - price_min) / intervals * i as f64;
        surface.text(
            Point::new(layout.plot_left() - 8.0, y + 4.0),
            &format!("${:.2}", price),
            y_label,
        );
    }

    let axis = Stroke {
        color: AXIS_COLOR,
        width: 1.0,
    };
    let origin = Point::new(layout.plot_left(), layout.plot_bottom());
    surface.line(Point::new(layout.plot_left(), layout.plot_top()), origin, axis);
    surface.line(origin, Point::new(layout.plot_right(), layout.plot_bottom()), axis);

    let plotted: Vec<Point> = points
        .iter()
        .map(|p| Point::new(x_scale.map(days(p.date)), y_scale.map(p.unit_price)))
        .collect();

    if plotted.len() > 1 {
        surface.polyline(
            &plotted,
            Stroke {
                color: SERIES_COLOR,
                width: 2.0,
            },
        );
    }

    for point in &plotted {
        surface.circle(*point, POINT_RADIUS, SERIES_COLOR);
        surface.circle(*point, POINT_CENTER_RADIUS, POINT_CENTER_COLOR);
    }

    let x_label = TextStyle {
        color: LABEL_COLOR,
        size: 11.0,
        anchor: Anchor::Middle,
    };
    for i in label_indices(points.len()) {
        surface.text(
            Point::new(plotted[i].x, layout.plot_bottom() + 20.0),
            &date_label(points[i].date),
            x_label,
        );
    }
}

/// Renders drawing calls into an SVG document
#[derive(Debug)]
pub struct SvgSurface {
    width: u32,
    height: u32,
    body: String,
}

impl SvgSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            body: String::new(),
        }
    }

    pub fn finish(self) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\" \
             font-family=\"-apple-system, BlinkMacSystemFont, sans-serif\">\n{body}</svg>\n",
            w = self.width,
            h = self.height,
            body = self.body
        )
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

// Writing to a String cannot fail, so the fmt::Results below are ignored
impl Surface for SvgSurface {
    fn line(&mut self, from: Point, to: Point, stroke: Stroke) {
        let _ = writeln!(
            self.body,
            "<line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{}\" stroke-width=\"{}\"/>",
            from.x, from.y, to.x, to.y, stroke.color, stroke.width
        );
    }

    fn polyline(&mut self, points: &[Point], stroke: Stroke) {
        let coords: Vec<String> = points
            .iter()
            .map(|p| format!("{:.1},{:.1}", p.x, p.y))
            .collect();
        let _ = writeln!(
            self.body,
            "<polyline points=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\"/>",
            coords.join(" "),
            stroke.color,
            stroke.width
        );
    }

    fn circle(&mut self, center: Point, radius: f64, fill: &'static str) {
        let _ = writeln!(
            self.body,
            "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"{}\" fill=\"{}\"/>",
            center.x, center.y, radius, fill
        );
    }

    fn text(&mut self, at: Point, text: &str, style: TextStyle) {
        let anchor = match style.anchor {
            Anchor::Start => "start",
            Anchor::Middle => "middle",
            Anchor::End => "end",
        };
        let _ = writeln!(
            self.body,
            "<text x=\"{:.1}\" y=\"{:.1}\" fill=\"{}\" font-size=\"{}\" text-anchor=\"{}\">{}</text>",
            at.x,
            at.y,
            style.color,
            style.size,
            anchor,
            escape_xml(text)
        );
    }
}

/// Render a price history as a standalone SVG document
pub fn price_chart_svg(history: &PriceHistory, width: u32, height: u32) -> String {
    let mut surface = SvgSurface::new(width, height);
    render_price_chart(&mut surface, history, ChartLayout::new(width, height));
    surface.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemWithContext;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Line(Point, Point, Stroke),
        Polyline(Vec<Point>),
        Circle(Point, f64, &'static str),
        Text(Point, String, TextStyle),
    }

    #[derive(Default)]
    struct RecordingSurface {
        calls: Vec<Call>,
    }

    impl RecordingSurface {
        fn texts(&self) -> Vec<(Point, String)> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Text(p, s, _) => Some((*p, s.clone())),
                    _ => None,
                })
                .collect()
        }

        fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
            self.calls.iter().filter(|c| pred(c)).count()
        }
    }

    impl Surface for RecordingSurface {
        fn line(&mut self, from: Point, to: Point, stroke: Stroke) {
            self.calls.push(Call::Line(from, to, stroke));
        }
        fn polyline(&mut self, points: &[Point], _stroke: Stroke) {
            self.calls.push(Call::Polyline(points.to_vec()));
        }
        fn circle(&mut self, center: Point, radius: f64, fill: &'static str) {
            self.calls.push(Call::Circle(center, radius, fill));
        }
        fn text(&mut self, at: Point, text: &str, style: TextStyle) {
            self.calls.push(Call::Text(at, text.to_string(), style));
        }
    }

    fn history(prices: &[(u32, f64)]) -> PriceHistory {
        let items: Vec<ItemWithContext> = prices
            .iter()
            .enumerate()
            .map(|(i, (day, price))| ItemWithContext {
                id: i as i64 + 1,
                receipt_id: 1,
                item_name: "Lumber".to_string(),
                purchase_date: NaiveDate::from_ymd_opt(2024, 3, *day).unwrap(),
                amount: *price,
                quantity: 1,
                unit_price: *price,
                store_location: None,
                job_name: None,
            })
            .collect();
        PriceHistory::for_item(&items, "lumber").unwrap()
    }

    fn render(history: &PriceHistory) -> RecordingSurface {
        let mut surface = RecordingSurface::default();
        render_price_chart(&mut surface, history, ChartLayout::new(400, 300));
        surface
    }

    #[test]
    fn test_linear_scale() {
        let scale = LinearScale::new((0.0, 10.0), (60.0, 160.0));
        assert_eq!(scale.map(0.0), 60.0);
        assert_eq!(scale.map(5.0), 110.0);
        assert_eq!(scale.map(10.0), 160.0);

        let inverted = LinearScale::new((0.0, 10.0), (260.0, 20.0));
        assert_eq!(inverted.map(10.0), 20.0);
    }

    #[test]
    fn test_zero_width_domain() {
        let scale = LinearScale::new((5.0, 5.0), (60.0, 380.0));
        assert_eq!(scale.map(5.0), 60.0);
        assert_eq!(scale.domain(), (5.0, 6.0));
    }

    #[test]
    fn test_label_indices() {
        assert!(label_indices(0).is_empty());
        assert_eq!(label_indices(3), vec![0, 1, 2]);
        assert_eq!(label_indices(4), vec![0, 2, 3]);
        assert_eq!(label_indices(7), vec![0, 3, 6]);
    }

    #[test]
    fn test_gridlines_and_price_labels() {
        let surface = render(&history(&[(1, 10.0), (10, 20.0)]));

        let gridlines = surface.count(|c| matches!(c, Call::Line(_, _, s) if s.color == GRID_COLOR));
        assert_eq!(gridlines, GRIDLINES);
        let axes = surface.count(|c| matches!(c, Call::Line(_, _, s) if s.color == AXIS_COLOR));
        assert_eq!(axes, 2);

        // y domain is [9, 22]; top label is the max, bottom the min
        let texts = surface.texts();
        assert_eq!(texts[0].1, "$22.00");
        assert_eq!(texts[0].0, Point::new(52.0, 24.0));
        assert_eq!(texts[4].1, "$9.00");
        assert_eq!(texts[4].0.y, 264.0);
    }

    #[test]
    fn test_points_span_plot_area() {
        let surface = render(&history(&[(1, 10.0), (5, 15.0), (9, 20.0)]));

        let polylines: Vec<&Vec<Point>> = surface
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Polyline(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(polylines.len(), 1);
        let line = polylines[0];
        assert_eq!(line.len(), 3);
        assert_eq!(line[0].x, 60.0);
        assert_eq!(line[1].x, 220.0);
        assert_eq!(line[2].x, 380.0);
        // Rising prices move up the screen
        assert!(line[0].y > line[1].y && line[1].y > line[2].y);

        let outer = surface.count(|c| matches!(c, Call::Circle(_, r, _) if *r == POINT_RADIUS));
        let inner =
            surface.count(|c| matches!(c, Call::Circle(_, r, f) if *r == POINT_CENTER_RADIUS && *f == POINT_CENTER_COLOR));
        assert_eq!(outer, 3);
        assert_eq!(inner, 3);
    }

    #[test]
    fn test_date_labels_first_middle_last() {
        let surface = render(&history(&[(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0), (5, 5.0)]));
        let dates: Vec<String> = surface
            .texts()
            .into_iter()
            .filter(|(p, _)| p.y == 280.0)
            .map(|(_, s)| s)
            .collect();
        assert_eq!(dates, vec!["Mar 1", "Mar 3", "Mar 5"]);
    }

    #[test]
    fn test_single_point_has_no_line() {
        let surface = render(&history(&[(7, 4.0)]));
        assert_eq!(surface.count(|c| matches!(c, Call::Polyline(_))), 0);
        assert_eq!(surface.count(|c| matches!(c, Call::Circle(..))), 2);
        // Degenerate x domain puts the point on the left edge
        let first_circle = surface
            .calls
            .iter()
            .find_map(|c| match c {
                Call::Circle(p, _, _) => Some(*p),
                _ => None,
            })
            .unwrap();
        assert_eq!(first_circle.x, 60.0);
        assert!(surface.texts().iter().any(|(_, s)| s == "Mar 7"));
    }

    #[test]
    fn test_empty_history_draws_nothing() {
        let mut empty = history(&[(1, 1.0)]);
        empty.points.clear();
        assert!(render(&empty).calls.is_empty());
    }

    #[test]
    fn test_svg_output() {
        let svg = price_chart_svg(&history(&[(1, 10.0), (2, 12.0)]), 400, 300);
        assert!(svg.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"400\" height=\"300\""));
        assert!(svg.contains("<polyline"));
        assert!(svg.contains(">$13.20</text>"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(escape_xml("A&B <x>"), "A&amp;B &lt;x&gt;");
    }
}
