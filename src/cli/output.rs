use serde::Serialize;

use crate::context::{Notification, NotificationKind};
use crate::model::activity::ActivityLogEntry;
use crate::model::chat::ChatMessage;
use crate::model::order::ServiceOrder;
use crate::model::sales::{CommercialQuote, Opportunity};
use crate::ops::board::Board;
use crate::ops::finance::{FinanceSummary, Totals};
use crate::ops::portal::PortalView;
use crate::ops::status::Transition;
use crate::ops::timeline::Timeline;
use crate::util::unicode::fit_to_width;

const STATUS_WIDTH: usize = 14;
const CLIENT_WIDTH: usize = 16;
/// Widest day grid printed; longer timelines are cut off with `…`
const TIMELINE_MAX_DAYS: usize = 120;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct BoardJson<'a> {
    pub columns: Vec<BoardColumnJson<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unassigned: Vec<&'a ServiceOrder>,
}

#[derive(Serialize)]
pub struct BoardColumnJson<'a> {
    pub title: &'a str,
    pub status: &'a str,
    pub color: &'a str,
    pub total_value: f64,
    pub orders: Vec<&'a ServiceOrder>,
}

#[derive(Serialize)]
pub struct TimelineJson<'a> {
    pub origin: String,
    pub days: usize,
    pub day_width: u32,
    pub width: u64,
    pub rows: Vec<TimelineRowJson<'a>>,
}

#[derive(Serialize)]
pub struct TimelineRowJson<'a> {
    pub number: &'a str,
    pub start: String,
    pub end: String,
    pub x: u64,
    pub width: u64,
    pub delivered: bool,
}

#[derive(Serialize)]
pub struct TransitionJson<'a> {
    pub order: &'a str,
    pub from: &'a str,
    pub to: &'a str,
    pub progress: u8,
    pub changed: bool,
}

#[derive(Serialize)]
pub struct TotalsJson {
    pub income: f64,
    pub expenses: f64,
    pub order_revenue: f64,
    pub order_costs: f64,
    pub profit: f64,
}

#[derive(Serialize)]
pub struct FinanceJson {
    pub totals: TotalsJson,
    pub months: Vec<MonthJson>,
    pub pipeline: f64,
}

#[derive(Serialize)]
pub struct MonthJson {
    pub month: String,
    #[serde(flatten)]
    pub totals: TotalsJson,
}

#[derive(Serialize)]
pub struct QuoteJson<'a> {
    #[serde(flatten)]
    pub quote: &'a CommercialQuote,
    pub total: f64,
}

#[derive(Serialize)]
pub struct ChatPageJson<'a> {
    pub messages: Vec<&'a ChatMessage>,
    pub has_more: bool,
}

#[derive(Serialize)]
pub struct StageJson<'a> {
    pub status: &'a str,
    pub progress: u8,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn board_to_json<'a>(board: &Board<'a>) -> BoardJson<'a> {
    BoardJson {
        columns: board
            .columns
            .iter()
            .map(|c| BoardColumnJson {
                title: &c.column.title,
                status: &c.column.status,
                color: &c.column.color,
                total_value: c.total_value(),
                orders: c.orders.clone(),
            })
            .collect(),
        unassigned: board.unassigned.clone(),
    }
}

pub fn timeline_to_json(timeline: &Timeline) -> TimelineJson<'_> {
    TimelineJson {
        origin: timeline.origin.to_string(),
        days: timeline.days,
        day_width: timeline.day_width,
        width: timeline.width(),
        rows: timeline
            .rows
            .iter()
            .map(|bar| TimelineRowJson {
                number: &bar.number,
                start: bar.start.to_string(),
                end: bar.end.to_string(),
                x: bar.x,
                width: bar.width,
                delivered: bar.delivered,
            })
            .collect(),
    }
}

pub fn totals_to_json(totals: &Totals) -> TotalsJson {
    TotalsJson {
        income: totals.income,
        expenses: totals.expenses,
        order_revenue: totals.order_revenue,
        order_costs: totals.order_costs,
        profit: totals.profit(),
    }
}

pub fn finance_to_json(summary: &FinanceSummary) -> FinanceJson {
    FinanceJson {
        totals: totals_to_json(&summary.totals),
        months: summary
            .months
            .iter()
            .map(|(month, totals)| MonthJson {
                month: month.clone(),
                totals: totals_to_json(totals),
            })
            .collect(),
        pipeline: summary.pipeline,
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

/// One-line order summary: number, stage, progress, due date, client and title
pub fn format_order_line(order: &ServiceOrder) -> String {
    let due = order
        .expected_delivery_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());
    let line = format!(
        "{}  {} {:>3}%  {:<10}  {}  {}",
        order.number,
        fit_to_width(&order.status, STATUS_WIDTH),
        order.progress,
        due,
        fit_to_width(&order.client, CLIENT_WIDTH),
        order.title
    );
    line.trim_end().to_string()
}

pub fn format_order_detail(order: &ServiceOrder) -> Vec<String> {
    let mut lines = vec![format!("{} {}", order.number, order.title)];
    lines.push(format!("client: {}", order.client));
    lines.push(format!("status: {} ({}%)", order.status, order.progress));
    lines.push(format!(
        "value: {:.2}  costs: {:.2}  margin: {:.2}",
        order.value,
        order.costs,
        order.margin()
    ));
    if let Some(responsible) = &order.responsible {
        lines.push(format!("responsible: {}", responsible));
    }
    lines.push(format!("created: {}", order.creation_date.format("%Y-%m-%d")));
    if let Some(due) = order.expected_delivery_date {
        lines.push(format!("due: {}", due));
    }
    if let Some(delivered) = order.delivery_date {
        lines.push(format!("delivered: {}", delivered.format("%Y-%m-%d")));
    }
    if let Some(token) = &order.shareable_token {
        lines.push(format!("portal: {}", crate::ops::portal::portal_path(token)));
    }
    if !order.tasks.is_empty() {
        lines.push(format!("tasks ({}/{}):", order.tasks_done(), order.tasks.len()));
        for (i, task) in order.tasks.iter().enumerate() {
            let mark = if task.done { 'x' } else { ' ' };
            lines.push(format!("  {}. [{}] {}", i + 1, mark, task.title));
        }
    }
    if !order.files.is_empty() {
        lines.push("files:".to_string());
        for file in &order.files {
            lines.push(format!("  {} {}", file.name, file.url));
        }
    }
    if !order.custom_fields.is_empty() {
        lines.push("fields:".to_string());
        for (key, value) in &order.custom_fields {
            lines.push(format!("  {}: {}", key, value));
        }
    }
    if !order.comments.is_empty() {
        lines.push("comments:".to_string());
        for comment in &order.comments {
            lines.push(format!(
                "  {} {}: {}",
                comment.timestamp.format("%Y-%m-%d %H:%M"),
                comment.author,
                comment.text
            ));
        }
    }
    lines
}

fn push_board_section(lines: &mut Vec<String>, header: String, orders: &[&ServiceOrder]) {
    lines.push(header);
    for order in orders {
        let line = format!(
            "  {}  {}  {}",
            order.number,
            fit_to_width(&order.client, CLIENT_WIDTH),
            order.title
        );
        lines.push(line.trim_end().to_string());
    }
}

pub fn format_board(board: &Board) -> Vec<String> {
    let mut lines = Vec::new();
    for column in &board.columns {
        let total = column.total_value();
        let header = if total > 0.0 {
            format!("{} ({})  {:.2}", column.column.title, column.orders.len(), total)
        } else {
            format!("{} ({})", column.column.title, column.orders.len())
        };
        push_board_section(&mut lines, header, &column.orders);
    }
    if !board.unassigned.is_empty() {
        push_board_section(
            &mut lines,
            format!("Unassigned ({})", board.unassigned.len()),
            &board.unassigned,
        );
    }
    lines
}

/// One character per day: `=` for open work, `#` for delivered orders
pub fn format_timeline(timeline: &Timeline) -> Vec<String> {
    let label_width = timeline
        .rows
        .iter()
        .map(|r| r.number.len())
        .max()
        .unwrap_or(0);
    let shown = timeline.days.min(TIMELINE_MAX_DAYS);
    let header = if shown < timeline.days {
        format!("from {} ({} days, first {} shown)", timeline.origin, timeline.days, shown)
    } else {
        format!("from {} ({} days)", timeline.origin, timeline.days)
    };
    let mut lines = vec![header];
    for bar in &timeline.rows {
        let fill = if bar.delivered { '#' } else { '=' };
        let mut cells = String::with_capacity(shown + 3);
        for day in 0..shown {
            let inside = day >= bar.start_day && day - bar.start_day < bar.days;
            cells.push(if inside { fill } else { '.' });
        }
        if shown < timeline.days {
            cells.push('…');
        }
        lines.push(format!("{:<w$}  {}", bar.number, cells, w = label_width));
    }
    lines
}

pub fn format_transition(number: &str, transition: Option<&Transition>, status: &str) -> String {
    match transition {
        Some(t) => format!("{}: {} ({}%)", number, t.describe(), t.progress),
        None => format!("{}: already {}", number, status),
    }
}

pub fn format_activity(entry: &ActivityLogEntry) -> String {
    let line = format!(
        "{}  {}  {}  {}  {}",
        entry.timestamp.format("%Y-%m-%d %H:%M"),
        entry.user,
        entry.action,
        entry.target,
        entry.details
    );
    line.trim_end().to_string()
}

pub fn format_portal(view: &PortalView) -> Vec<String> {
    let mut lines = vec![
        format!("{} {}", view.number, view.title),
        format!("client: {}", view.client),
        format!("status: {} ({}%)", view.status, view.progress),
    ];
    if let Some(due) = view.expected_delivery_date {
        lines.push(format!("expected: {}", due));
    }
    if let Some(delivered) = view.delivery_date {
        lines.push(format!("delivered: {}", delivered.format("%Y-%m-%d")));
    }
    if view.tasks_total > 0 {
        lines.push(format!("tasks: {}/{}", view.tasks_done, view.tasks_total));
    }
    for file in &view.files {
        lines.push(format!("file: {}", file));
    }
    lines
}

pub fn format_quote(quote: &CommercialQuote) -> String {
    format!(
        "{}  {:<8}  {}  {}  {:.2}",
        quote.id,
        quote.status.as_str(),
        fit_to_width(&quote.client, CLIENT_WIDTH),
        quote.description,
        quote.total()
    )
}

pub fn format_opportunity(opportunity: &Opportunity) -> String {
    format!(
        "{}  {:<11}  {}  {}  {:.2}",
        opportunity.id,
        opportunity.status.as_str(),
        fit_to_width(&opportunity.client, CLIENT_WIDTH),
        opportunity.title,
        opportunity.estimated_value
    )
}

pub fn format_message(message: &ChatMessage) -> String {
    let mut line = format!(
        "{}  {} {}: {}",
        &message.id[..message.id.len().min(8)],
        message.timestamp.format("%H:%M"),
        message.author,
        message.text
    );
    if !message.reactions.is_empty() {
        let reactions: Vec<String> = message
            .reactions
            .iter()
            .map(|(emoji, users)| format!("{} {}", emoji, users.len()))
            .collect();
        line.push_str(&format!("  [{}]", reactions.join(", ")));
    }
    line
}

pub fn format_finance(summary: &FinanceSummary) -> Vec<String> {
    let t = &summary.totals;
    let mut lines = vec![
        format!("income        {:>12.2}", t.income),
        format!("expenses      {:>12.2}", t.expenses),
        format!("order revenue {:>12.2}", t.order_revenue),
        format!("order costs   {:>12.2}", t.order_costs),
        format!("profit        {:>12.2}", t.profit()),
        format!("pipeline      {:>12.2}", summary.pipeline),
    ];
    if !summary.months.is_empty() {
        lines.push(String::new());
        for (month, m) in &summary.months {
            lines.push(format!(
                "{}  in {:.2}  out {:.2}  profit {:.2}",
                month,
                m.income + m.order_revenue,
                m.expenses + m.order_costs,
                m.profit()
            ));
        }
    }
    lines
}

pub fn format_notification(note: &Notification) -> String {
    let mark = match note.kind {
        NotificationKind::Info => "»",
        NotificationKind::Success => "✓",
        NotificationKind::Mention => "@",
    };
    format!("{} {}", mark, note.message)
}
