use chrono::{DateTime, Utc};

use crate::model::order::ServiceOrder;
use crate::model::workflow::Workflow;

/// Progress of an order sitting in the terminal column
pub const TERMINAL_PROGRESS: u8 = 100;
/// Ceiling of the non-terminal scale; only delivery reaches 100
const SCALE: f64 = 99.0;

/// Error type for status operations
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StatusError {
    #[error("unknown status {0:?}: not a column of the workflow")]
    UnknownStatus(String),
}

/// A completed stage change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub progress: u8,
    /// True when this transition stamped the delivery date
    pub delivered_now: bool,
}

impl Transition {
    /// Text for the activity log and notifications
    pub fn describe(&self) -> String {
        format!("{} → {}", self.from, self.to)
    }
}

/// Completion percentage of `status` within the workflow.
///
/// Non-terminal column `i` of `n` maps to `round((i + 1) / n * 99)`, the
/// terminal column to 100. Statuses outside the workflow map to 0.
pub fn progress_for(status: &str, workflow: &Workflow) -> u8 {
    if workflow.is_terminal(status) {
        return TERMINAL_PROGRESS;
    }
    let n = workflow.non_terminal().count();
    match workflow.non_terminal().position(|c| c.status == status) {
        Some(i) if n > 0 => ((i + 1) as f64 / n as f64 * SCALE).round() as u8,
        _ => 0,
    }
}

/// Move an order to `to`.
///
/// Returns `Ok(None)` when the order is already there: nothing changes.
/// Otherwise updates status, progress and `last_status_update`, and stamps
/// `delivery_date` on first arrival at the terminal stage only.
pub fn transition(
    order: &mut ServiceOrder,
    to: &str,
    workflow: &Workflow,
    now: DateTime<Utc>,
) -> Result<Option<Transition>, StatusError> {
    if order.status == to {
        return Ok(None);
    }
    if !workflow.contains(to) {
        return Err(StatusError::UnknownStatus(to.to_string()));
    }

    let from = std::mem::replace(&mut order.status, to.to_string());
    order.progress = progress_for(to, workflow);
    order.last_status_update = now;

    let mut delivered_now = false;
    if workflow.is_terminal(to) && order.delivery_date.is_none() {
        order.delivery_date = Some(now);
        delivered_now = true;
    }

    Ok(Some(Transition {
        from,
        to: to.to_string(),
        progress: order.progress,
        delivered_now,
    }))
}

/// The full progress scale of a workflow, in column order
pub fn progress_scale(workflow: &Workflow) -> Vec<(&str, u8)> {
    workflow
        .columns()
        .iter()
        .map(|c| (c.status.as_str(), progress_for(&c.status, workflow)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::workflow::KanbanColumn;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn workflow() -> Workflow {
        Workflow::default()
    }

    fn sample_order() -> ServiceOrder {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        ServiceOrder::new(
            "o1".into(),
            "OS-001".into(),
            "Acme".into(),
            "Lookbook".into(),
            "Waiting".into(),
            t0,
        )
    }

    #[test]
    fn progress_follows_formula_for_every_stage() {
        let wf = workflow();
        let n = wf.non_terminal().count();
        for (i, col) in wf.non_terminal().enumerate() {
            let expected = ((i + 1) as f64 / n as f64 * 99.0).round() as u8;
            assert_eq!(progress_for(&col.status, &wf), expected, "{}", col.status);
        }
        assert_eq!(progress_for("Delivered", &wf), 100);
    }

    #[test]
    fn default_scale() {
        assert_eq!(
            progress_scale(&workflow()),
            vec![
                ("Waiting", 17),
                ("Shooting", 33),
                ("Development", 50),
                ("PostProd", 66),
                ("ColorGrading", 83),
                ("Approval", 99),
                ("Delivered", 100),
            ]
        );
    }

    #[test]
    fn unknown_status_has_no_progress() {
        assert_eq!(progress_for("Archived", &workflow()), 0);
    }

    #[test]
    fn terminal_only_workflow() {
        let wf = Workflow::new(vec![KanbanColumn::new("Done", "Done", "#000")], "Done").unwrap();
        assert_eq!(progress_for("Done", &wf), 100);
        assert_eq!(progress_for("Other", &wf), 0);
    }

    #[test]
    fn transition_to_approval_then_delivered() {
        let wf = workflow();
        let mut order = sample_order();
        let now = order.creation_date + Duration::days(3);

        let t = transition(&mut order, "Approval", &wf, now).unwrap().unwrap();
        assert_eq!(t.from, "Waiting");
        assert_eq!(t.progress, 99);
        assert!(!t.delivered_now);
        assert_eq!(order.last_status_update, now);
        assert!(order.delivery_date.is_none());

        let later = now + Duration::days(1);
        let t = transition(&mut order, "Delivered", &wf, later).unwrap().unwrap();
        assert_eq!(t.describe(), "Approval → Delivered");
        assert_eq!(order.progress, 100);
        assert!(t.delivered_now);
        assert_eq!(order.delivery_date, Some(later));
    }

    #[test]
    fn same_stage_is_noop() {
        let wf = workflow();
        let mut order = sample_order();
        let before = order.clone();
        let result = transition(&mut order, "Waiting", &wf, Utc::now()).unwrap();
        assert!(result.is_none());
        assert_eq!(order, before);
    }

    #[test]
    fn redelivery_keeps_first_delivery_date() {
        let wf = workflow();
        let mut order = sample_order();
        let first = order.creation_date + Duration::days(5);
        transition(&mut order, "Delivered", &wf, first).unwrap();

        let reopened = first + Duration::days(1);
        transition(&mut order, "PostProd", &wf, reopened).unwrap();
        assert_eq!(order.delivery_date, Some(first));

        let second = reopened + Duration::days(1);
        let t = transition(&mut order, "Delivered", &wf, second).unwrap().unwrap();
        assert!(!t.delivered_now);
        assert_eq!(order.delivery_date, Some(first));
        assert_eq!(order.last_status_update, second);
    }

    #[test]
    fn unknown_target_is_rejected_untouched() {
        let wf = workflow();
        let mut order = sample_order();
        let before = order.clone();
        assert_eq!(
            transition(&mut order, "Lost", &wf, Utc::now()),
            Err(StatusError::UnknownStatus("Lost".into()))
        );
        assert_eq!(order, before);
    }
}
