use chrono::{DateTime, Utc};

use crate::model::order::ServiceOrder;
use crate::model::sales::{CommercialQuote, Opportunity, QuoteItem};

/// Parse a quote item spec `description:quantity:unit_price`.
/// The description may itself contain colons.
pub fn parse_quote_item(spec: &str) -> Option<QuoteItem> {
    let mut parts = spec.rsplitn(3, ':');
    let unit_price = parts.next()?.trim().parse().ok()?;
    let quantity = parts.next()?.trim().parse().ok()?;
    let description = parts.next()?.trim();
    if description.is_empty() {
        return None;
    }
    Some(QuoteItem {
        description: description.to_string(),
        quantity,
        unit_price,
    })
}

/// New order copied from a quote. The quote is not linked back.
pub fn quote_to_order(
    quote: &CommercialQuote,
    id: String,
    number: String,
    status: &str,
    now: DateTime<Utc>,
) -> ServiceOrder {
    let mut order = ServiceOrder::new(
        id,
        number,
        quote.client.clone(),
        quote.description.clone(),
        status.to_string(),
        now,
    );
    order.value = quote.total();
    order.tasks = quote
        .items
        .iter()
        .map(|item| crate::model::order::OrderTask {
            title: item.description.clone(),
            done: false,
        })
        .collect();
    order
}

/// New order copied from an opportunity. The opportunity is not linked back.
pub fn opportunity_to_order(
    opportunity: &Opportunity,
    id: String,
    number: String,
    status: &str,
    now: DateTime<Utc>,
) -> ServiceOrder {
    let mut order = ServiceOrder::new(
        id,
        number,
        opportunity.client.clone(),
        opportunity.title.clone(),
        status.to_string(),
        now,
    );
    order.value = opportunity.estimated_value;
    order
}
