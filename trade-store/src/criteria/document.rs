//! Criteria compiler for the document store.

use crate::document::client::{DocumentCondition, DocumentFilter};
use crate::document::layout::{attr, encode_instant};
use serde_json::Value;
use trade_domain::SearchCriteria;

fn eq(filter: DocumentFilter, attribute: &str, value: &Option<String>) -> DocumentFilter {
    match value {
        Some(v) => filter.and(DocumentCondition::Eq {
            attribute: attribute.to_string(),
            value: Value::String(v.clone()),
        }),
        None => filter,
    }
}

/// Compile criteria into a scan filter over trade documents
pub fn compile(criteria: &SearchCriteria) -> DocumentFilter {
    let mut filter = DocumentFilter::all();
    filter = eq(filter, attr::BUSINESS_UNIT, &criteria.business_unit);
    filter = eq(filter, attr::MARKET, &criteria.market);
    filter = eq(filter, attr::TRADER_NAME, &criteria.trader_name);
    filter = eq(filter, attr::AGREEMENT_ID, &criteria.agreement_id);
    filter = eq(filter, attr::COMMODITY, &criteria.commodity);
    filter = eq(filter, attr::TRANSACTION_TYPE, &criteria.transaction_type);
    filter = eq(filter, attr::REFERENCE_ZONE, &criteria.reference_zone);

    if let Some(date) = criteria.trade_date {
        filter = filter.and(DocumentCondition::Eq {
            attribute: attr::TRADE_DATE.to_string(),
            value: Value::String(date.format("%Y-%m-%d").to_string()),
        });
    }
    if let Some(from) = criteria.trade_timestamp_from {
        filter = filter.and(DocumentCondition::Gte {
            attribute: attr::TRADE_TIMESTAMP.to_string(),
            value: Value::from(encode_instant(from)),
        });
    }
    if let Some(to) = criteria.trade_timestamp_to {
        filter = filter.and(DocumentCondition::Lt {
            attribute: attr::TRADE_TIMESTAMP.to_string(),
            value: Value::from(encode_instant(to)),
        });
    }

    filter
}
