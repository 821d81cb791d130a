use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::finance::{EntryKind, FinancialEntry};
use crate::model::order::ServiceOrder;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub income: f64,
    pub expenses: f64,
    /// Value of orders delivered in the period
    pub order_revenue: f64,
    /// Costs of orders delivered in the period
    pub order_costs: f64,
}

impl Totals {
    pub fn profit(&self) -> f64 {
        self.income + self.order_revenue - self.expenses - self.order_costs
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FinanceSummary {
    pub totals: Totals,
    /// Keyed by `YYYY-MM`
    pub months: BTreeMap<String, Totals>,
    /// Value of orders not yet delivered
    pub pipeline: f64,
}

/// Dashboard figures: ledger entries plus delivered order values, bucketed
/// by month of the entry date or delivery date.
pub fn summarize(orders: &[ServiceOrder], entries: &[FinancialEntry]) -> FinanceSummary {
    let mut summary = FinanceSummary::default();

    for entry in entries {
        let month = entry.date.format("%Y-%m").to_string();
        let bucket = summary.months.entry(month).or_default();
        match entry.kind {
            EntryKind::Income => {
                bucket.income += entry.amount;
                summary.totals.income += entry.amount;
            }
            EntryKind::Expense => {
                bucket.expenses += entry.amount;
                summary.totals.expenses += entry.amount;
            }
        }
    }

    for order in orders {
        match order.delivery_date {
            Some(delivered) => {
                let month = delivered.format("%Y-%m").to_string();
                let bucket = summary.months.entry(month).or_default();
                bucket.order_revenue += order.value;
                bucket.order_costs += order.costs;
                summary.totals.order_revenue += order.value;
                summary.totals.order_costs += order.costs;
            }
            None => summary.pipeline += order.value,
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn entry(kind: EntryKind, amount: f64, m: u32) -> FinancialEntry {
        FinancialEntry {
            id: format!("{:?}{}", kind, m),
            kind,
            description: String::new(),
            amount,
            date: NaiveDate::from_ymd_opt(2025, m, 15).unwrap(),
            order_id: None,
        }
    }

    fn order(value: f64, costs: f64, delivered_month: Option<u32>) -> ServiceOrder {
        let mut o = ServiceOrder::new(
            "o".into(),
            "OS-001".into(),
            "c".into(),
            String::new(),
            "Waiting".into(),
            Utc::now(),
        );
        o.value = value;
        o.costs = costs;
        o.delivery_date =
            delivered_month.map(|m| Utc.with_ymd_and_hms(2025, m, 2, 10, 0, 0).unwrap());
        o
    }

    #[test]
    fn totals_and_months() {
        let entries = vec![
            entry(EntryKind::Income, 500.0, 1),
            entry(EntryKind::Expense, 200.0, 1),
            entry(EntryKind::Expense, 50.0, 2),
        ];
        let orders = vec![
            order(3000.0, 800.0, Some(2)),
            order(1000.0, 100.0, None),
        ];
        let s = summarize(&orders, &entries);

        assert_eq!(s.totals.income, 500.0);
        assert_eq!(s.totals.expenses, 250.0);
        assert_eq!(s.totals.order_revenue, 3000.0);
        assert_eq!(s.totals.order_costs, 800.0);
        assert_eq!(s.totals.profit(), 2450.0);
        assert_eq!(s.pipeline, 1000.0);

        let months: Vec<_> = s.months.keys().cloned().collect();
        assert_eq!(months, vec!["2025-01", "2025-02"]);
        assert_eq!(s.months["2025-01"].profit(), 300.0);
        assert_eq!(s.months["2025-02"].profit(), 2150.0);
    }

    #[test]
    fn empty_is_zero() {
        let s = summarize(&[], &[]);
        assert_eq!(s, FinanceSummary::default());
        assert_eq!(s.totals.profit(), 0.0);
    }
}
