use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::model::order::ServiceOrder;

/// Route prefix of the client portal
pub const PORTAL_PREFIX: &str = "/portal/";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PortalError {
    #[error("portal link not found")]
    NotFound,
}

/// What a client sees through a shareable link. Financial fields, comments
/// and staff assignments are left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortalView {
    pub number: String,
    pub title: String,
    pub client: String,
    pub status: String,
    pub progress: u8,
    pub expected_delivery_date: Option<NaiveDate>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub tasks_done: usize,
    pub tasks_total: usize,
    pub files: Vec<String>,
}

impl From<&ServiceOrder> for PortalView {
    fn from(order: &ServiceOrder) -> Self {
        PortalView {
            number: order.number.clone(),
            title: order.title.clone(),
            client: order.client.clone(),
            status: order.status.clone(),
            progress: order.progress,
            expected_delivery_date: order.expected_delivery_date,
            delivery_date: order.delivery_date,
            tasks_done: order.tasks_done(),
            tasks_total: order.tasks.len(),
            files: order.files.iter().map(|f| f.name.clone()).collect(),
        }
    }
}

/// Fresh opaque token for a shareable link
pub fn generate_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Accept either a bare token or a `/portal/<token>` path (optionally a full URL)
pub fn token_from_path(input: &str) -> Option<&str> {
    let input = input.trim();
    let token = match input.find(PORTAL_PREFIX) {
        Some(pos) => &input[pos + PORTAL_PREFIX.len()..],
        None if input.contains('/') => return None,
        None => input,
    };
    let token = token.trim_end_matches('/');
    if token.is_empty() || token.contains('/') {
        None
    } else {
        Some(token)
    }
}

/// Public path for a token
pub fn portal_path(token: &str) -> String {
    format!("{}{}", PORTAL_PREFIX, token)
}

/// Resolve a token to the read-only view of its order
pub fn portal_view(orders: &[ServiceOrder], token: &str) -> Result<PortalView, PortalError> {
    orders
        .iter()
        .find(|o| o.shareable_token.as_deref() == Some(token))
        .map(PortalView::from)
        .ok_or(PortalError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::order::OrderTask;

    fn shared_order() -> ServiceOrder {
        let mut o = ServiceOrder::new(
            "o1".into(),
            "OS-007".into(),
            "Acme".into(),
            "Lookbook".into(),
            "PostProd".into(),
            Utc::now(),
        );
        o.progress = 66;
        o.value = 9000.0;
        o.shareable_token = Some("tok123".into());
        o.tasks = vec![
            OrderTask {
                title: "select".into(),
                done: true,
            },
            OrderTask {
                title: "retouch".into(),
                done: false,
            },
        ];
        o
    }

    #[test]
    fn resolves_token() {
        let orders = vec![shared_order()];
        let view = portal_view(&orders, "tok123").unwrap();
        assert_eq!(view.number, "OS-007");
        assert_eq!(view.progress, 66);
        assert_eq!((view.tasks_done, view.tasks_total), (1, 2));

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("value").is_none());
    }

    #[test]
    fn unknown_token_is_not_found() {
        let orders = vec![shared_order()];
        assert_eq!(portal_view(&orders, "nope"), Err(PortalError::NotFound));
    }

    #[test]
    fn unshared_orders_never_match() {
        let mut o = shared_order();
        o.shareable_token = None;
        assert_eq!(portal_view(&[o], ""), Err(PortalError::NotFound));
    }

    #[test]
    fn token_parsing() {
        assert_eq!(token_from_path("abc"), Some("abc"));
        assert_eq!(token_from_path("/portal/abc"), Some("abc"));
        assert_eq!(token_from_path("https://studio.example/portal/abc/"), Some("abc"));
        assert_eq!(token_from_path("/portal/"), None);
        assert_eq!(token_from_path("/portal/a/b"), None);
        assert_eq!(token_from_path("/orders/abc"), None);
    }

    #[test]
    fn generated_tokens_are_distinct() {
        let a = generate_token();
        assert_eq!(a.len(), 32);
        assert_ne!(a, generate_token());
        assert_eq!(portal_path(&a), format!("/portal/{}", a));
    }
}
