use chrono::NaiveDate;

use crate::model::order::ServiceOrder;

/// One order's bar on the timeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineBar {
    pub order_id: String,
    pub number: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Day offset from the timeline origin
    pub start_day: usize,
    /// Length in days, at least 1
    pub days: usize,
    pub x: u64,
    pub width: u64,
    pub delivered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    /// First day shown
    pub origin: NaiveDate,
    /// Number of days spanned by all bars
    pub days: usize,
    pub day_width: u32,
    /// One row per order, in input order
    pub rows: Vec<TimelineBar>,
}

impl Timeline {
    /// Total width of the chart in pixels
    pub fn width(&self) -> u64 {
        span_width(self.days, self.day_width)
    }
}

/// Pixel offset of `date` relative to `origin`. Negative before the origin.
pub fn date_to_x(origin: NaiveDate, date: NaiveDate, day_width: u32) -> i64 {
    (date - origin).num_days() * i64::from(day_width)
}

/// The day `x` falls on, inverse of [`date_to_x`]
pub fn x_to_date(origin: NaiveDate, x: i64, day_width: u32) -> NaiveDate {
    let days = x.div_euclid(i64::from(day_width.max(1)));
    origin + chrono::Duration::days(days)
}

/// Pixels covered by `days` whole days. Far-off dates with a wide day
/// saturate instead of wrapping.
fn span_width(days: usize, day_width: u32) -> u64 {
    (days as u64).saturating_mul(u64::from(day_width))
}

/// Span of an order: creation through expected (or actual) delivery.
/// An end before the start collapses to a single day.
fn order_span(order: &ServiceOrder) -> (NaiveDate, NaiveDate) {
    let start = order.creation_date.date_naive();
    let end = order
        .expected_delivery_date
        .or_else(|| order.delivery_date.map(|d| d.date_naive()))
        .unwrap_or(start);
    (start, end.max(start))
}

/// Lay the orders out on a shared day grid. Returns `None` for no orders.
pub fn build_timeline(orders: &[&ServiceOrder], day_width: u32) -> Option<Timeline> {
    let spans: Vec<(NaiveDate, NaiveDate)> = orders.iter().map(|o| order_span(o)).collect();
    let origin = spans.iter().map(|(s, _)| *s).min()?;
    let last = spans.iter().map(|(_, e)| *e).max()?;

    let rows = orders
        .iter()
        .zip(&spans)
        .map(|(order, &(start, end))| {
            let start_day = (start - origin).num_days() as usize;
            let days = (end - start).num_days() as usize + 1;
            TimelineBar {
                order_id: order.id.clone(),
                number: order.number.clone(),
                start,
                end,
                start_day,
                days,
                x: span_width(start_day, day_width),
                width: span_width(days, day_width),
                delivered: order.delivery_date.is_some(),
            }
        })
        .collect();

    Some(Timeline {
        origin,
        days: (last - origin).num_days() as usize + 1,
        day_width,
        rows,
    })
}
