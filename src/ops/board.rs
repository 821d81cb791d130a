use chrono::NaiveDate;
use regex::{Regex, RegexBuilder};

use crate::model::config::SavedView;
use crate::model::order::{ServiceOrder, order_number_value};
use crate::model::workflow::{KanbanColumn, Workflow};

/// Board/list filter state. All set criteria must match.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    search: Option<Regex>,
    pub responsible: Option<String>,
    /// Inclusive lower bound on the creation date
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the creation date
    pub to: Option<NaiveDate>,
}

impl OrderFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive literal search term. Blank terms match everything.
    pub fn with_search(mut self, term: &str) -> Self {
        let term = term.trim();
        self.search = if term.is_empty() {
            None
        } else {
            RegexBuilder::new(&regex::escape(term))
                .case_insensitive(true)
                .build()
                .ok()
        };
        self
    }

    pub fn with_responsible(mut self, user_id: &str) -> Self {
        self.responsible = Some(user_id.to_string());
        self
    }

    pub fn with_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    /// Build the filter a saved view describes
    pub fn from_view(view: &SavedView) -> Self {
        let mut filter = OrderFilter::new().with_range(view.from, view.to);
        if let Some(term) = &view.search {
            filter = filter.with_search(term);
        }
        if let Some(user) = &view.responsible {
            filter = filter.with_responsible(user);
        }
        filter
    }

    /// Matches on client name, order number or status
    fn matches_search(&self, order: &ServiceOrder) -> bool {
        match &self.search {
            Some(re) => {
                re.is_match(&order.client) || re.is_match(&order.number) || re.is_match(&order.status)
            }
            None => true,
        }
    }

    pub fn matches(&self, order: &ServiceOrder) -> bool {
        if !self.matches_search(order) {
            return false;
        }
        if let Some(user) = &self.responsible
            && order.responsible.as_deref() != Some(user.as_str())
        {
            return false;
        }
        let created = order.creation_date.date_naive();
        if let Some(from) = self.from
            && created < from
        {
            return false;
        }
        if let Some(to) = self.to
            && created > to
        {
            return false;
        }
        true
    }
}

/// Board ordering: earliest expected delivery first, undated last, then by number
fn board_order(a: &ServiceOrder, b: &ServiceOrder) -> std::cmp::Ordering {
    let due = |o: &ServiceOrder| o.expected_delivery_date.unwrap_or(NaiveDate::MAX);
    due(a)
        .cmp(&due(b))
        .then_with(|| order_number_value(&a.number).cmp(&order_number_value(&b.number)))
        .then_with(|| a.number.cmp(&b.number))
}

/// Orders passing the filter, in board order
pub fn filter_orders<'a>(orders: &'a [ServiceOrder], filter: &OrderFilter) -> Vec<&'a ServiceOrder> {
    let mut result: Vec<&ServiceOrder> = orders.iter().filter(|o| filter.matches(o)).collect();
    result.sort_by(|a, b| board_order(a, b));
    result
}

#[derive(Debug)]
pub struct BoardColumn<'a> {
    pub column: &'a KanbanColumn,
    pub orders: Vec<&'a ServiceOrder>,
}

impl BoardColumn<'_> {
    /// Sum of order values in this column
    pub fn total_value(&self) -> f64 {
        self.orders.iter().map(|o| o.value).sum()
    }
}

/// Orders grouped by workflow column
#[derive(Debug)]
pub struct Board<'a> {
    pub columns: Vec<BoardColumn<'a>>,
    /// Orders whose status is not a column of the workflow
    pub unassigned: Vec<&'a ServiceOrder>,
}

impl Board<'_> {
    pub fn len(&self) -> usize {
        self.columns.iter().map(|c| c.orders.len()).sum::<usize>() + self.unassigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn build_board<'a>(
    orders: &'a [ServiceOrder],
    workflow: &'a Workflow,
    filter: &OrderFilter,
) -> Board<'a> {
    let mut columns: Vec<BoardColumn<'a>> = workflow
        .columns()
        .iter()
        .map(|column| BoardColumn {
            column,
            orders: Vec::new(),
        })
        .collect();
    let mut unassigned = Vec::new();

    for order in filter_orders(orders, filter) {
        match columns.iter_mut().find(|c| c.column.status == order.status) {
            Some(col) => col.orders.push(order),
            None => unassigned.push(order),
        }
    }
    Board {
        columns,
        unassigned,
    }
}
