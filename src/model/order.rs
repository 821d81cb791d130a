use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A checklist item inside an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTask {
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

/// A staff comment on an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// A file delivered or referenced by an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

/// A unit of studio work moving through the Kanban workflow.
///
/// Documents are stored with camelCase keys. Equality is deep value
/// equality over every field, which the auto-save reconciler relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOrder {
    pub id: String,
    /// Human-facing number like `OS-014`
    pub number: String,
    pub client: String,
    #[serde(default)]
    pub title: String,
    /// One of the configured column status names
    pub status: String,
    /// Derived from `status`, 0..=100
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub costs: f64,
    /// User id of the person responsible
    #[serde(default)]
    pub responsible: Option<String>,
    pub creation_date: DateTime<Utc>,
    #[serde(default)]
    pub expected_delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub delivery_date: Option<DateTime<Utc>>,
    pub last_status_update: DateTime<Utc>,
    #[serde(default)]
    pub tasks: Vec<OrderTask>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub files: Vec<Attachment>,
    #[serde(default)]
    pub custom_fields: IndexMap<String, String>,
    #[serde(default)]
    pub shareable_token: Option<String>,
}

impl ServiceOrder {
    /// Create a fresh order in the given status. Progress is left at 0;
    /// callers compute it against the workflow.
    pub fn new(
        id: String,
        number: String,
        client: String,
        title: String,
        status: String,
        now: DateTime<Utc>,
    ) -> Self {
        ServiceOrder {
            id,
            number,
            client,
            title,
            status,
            progress: 0,
            value: 0.0,
            costs: 0.0,
            responsible: None,
            creation_date: now,
            expected_delivery_date: None,
            delivery_date: None,
            last_status_update: now,
            tasks: Vec::new(),
            comments: Vec::new(),
            files: Vec::new(),
            custom_fields: IndexMap::new(),
            shareable_token: None,
        }
    }

    /// Value minus costs
    pub fn margin(&self) -> f64 {
        self.value - self.costs
    }

    /// Number of checklist items marked done
    pub fn tasks_done(&self) -> usize {
        self.tasks.iter().filter(|t| t.done).count()
    }
}

/// Parse the numeric suffix of an order number (`OS-014` → 14)
pub fn order_number_value(number: &str) -> Option<u32> {
    number.rsplit('-').next()?.parse().ok()
}

/// Next sequential order number, one past the highest existing one.
pub fn next_order_number(orders: &[ServiceOrder]) -> String {
    let max = orders
        .iter()
        .filter_map(|o| order_number_value(&o.number))
        .max()
        .unwrap_or(0);
    format!("OS-{:03}", max + 1)
}
