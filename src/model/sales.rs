use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a commercial quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Approved,
    Rejected,
}

impl QuoteStatus {
    pub fn parse_status(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "draft" => Some(QuoteStatus::Draft),
            "sent" => Some(QuoteStatus::Sent),
            "approved" => Some(QuoteStatus::Approved),
            "rejected" => Some(QuoteStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Sent => "sent",
            QuoteStatus::Approved => "approved",
            QuoteStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
}

impl QuoteItem {
    pub fn subtotal(&self) -> f64 {
        self.quantity * self.unit_price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommercialQuote {
    pub id: String,
    pub client: String,
    pub description: String,
    #[serde(default)]
    pub items: Vec<QuoteItem>,
    pub status: QuoteStatus,
    pub created: DateTime<Utc>,
}

impl CommercialQuote {
    pub fn total(&self) -> f64 {
        self.items.iter().map(QuoteItem::subtotal).sum()
    }
}

/// Stage of a CRM opportunity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityStatus {
    Lead,
    Qualified,
    Proposal,
    Negotiation,
    Won,
    Lost,
}

impl OpportunityStatus {
    pub fn parse_status(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lead" => Some(OpportunityStatus::Lead),
            "qualified" => Some(OpportunityStatus::Qualified),
            "proposal" => Some(OpportunityStatus::Proposal),
            "negotiation" => Some(OpportunityStatus::Negotiation),
            "won" => Some(OpportunityStatus::Won),
            "lost" => Some(OpportunityStatus::Lost),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OpportunityStatus::Lead => "lead",
            OpportunityStatus::Qualified => "qualified",
            OpportunityStatus::Proposal => "proposal",
            OpportunityStatus::Negotiation => "negotiation",
            OpportunityStatus::Won => "won",
            OpportunityStatus::Lost => "lost",
        }
    }

    /// Won and lost opportunities are closed
    pub fn is_closed(self) -> bool {
        matches!(self, OpportunityStatus::Won | OpportunityStatus::Lost)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub id: String,
    pub client: String,
    pub title: String,
    #[serde(default)]
    pub estimated_value: f64,
    pub status: OpportunityStatus,
    pub created: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_total_sums_items() {
        let q = CommercialQuote {
            id: "q1".into(),
            client: "Acme".into(),
            description: "Catalog shoot".into(),
            items: vec![
                QuoteItem {
                    description: "Shooting day".into(),
                    quantity: 2.0,
                    unit_price: 1500.0,
                },
                QuoteItem {
                    description: "Retouch".into(),
                    quantity: 40.0,
                    unit_price: 25.0,
                },
            ],
            status: QuoteStatus::Draft,
            created: Utc::now(),
        };
        assert_eq!(q.total(), 4000.0);
    }

    #[test]
    fn status_parsing() {
        assert_eq!(QuoteStatus::parse_status("Sent"), Some(QuoteStatus::Sent));
        assert_eq!(QuoteStatus::parse_status("maybe"), None);
        assert_eq!(
            OpportunityStatus::parse_status("negotiation"),
            Some(OpportunityStatus::Negotiation)
        );
        assert!(OpportunityStatus::Lost.is_closed());
        assert!(!OpportunityStatus::Proposal.is_closed());
    }
}
