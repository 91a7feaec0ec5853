//! Intake wire schema.
//!
//! Every field maps to the like-named domain field. Omitted fields take their
//! zero value.

use crate::models::{Product, Receipt};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_tax"))]
pub struct ProductRequest {
    pub name: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub total_price: i64,
    pub tax_rate: String,
    pub tax_value: i64,
}

/// Taxed items must carry a non-negative tax value.
fn validate_tax(product: &ProductRequest) -> Result<(), ValidationError> {
    if !product.tax_rate.is_empty() && product.tax_value < 0 {
        return Err(ValidationError::new("negative_tax_value")
            .with_message("tax_value must be non-negative for a taxed product".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ReceiptRequest {
    pub number: i64,
    /// RFC 3339 string or epoch seconds
    #[serde(deserialize_with = "deserialize_date")]
    pub date: Option<DateTime<FixedOffset>>,
    pub organization: String,
    pub payment_address: String,
    pub taxpayer_number: String,
    pub taxation_type: String,
    pub calculation_sign: String,
    #[validate(nested)]
    pub products: Vec<ProductRequest>,
    pub customer_email: String,
    pub fiscal_device_number: String,
    pub cash_register_number: String,
    pub fiscal_document: String,
    pub fiscal_attribute: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DateInput {
    Epoch(i64),
    Text(String),
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<DateInput>::deserialize(deserializer)? {
        None => Ok(None),
        Some(DateInput::Text(text)) => DateTime::parse_from_rfc3339(&text)
            .map(Some)
            .map_err(|e| de::Error::custom(format!("invalid date {text:?}: {e}"))),
        Some(DateInput::Epoch(seconds)) => DateTime::<Utc>::from_timestamp(seconds, 0)
            .map(|d| Some(d.fixed_offset()))
            .ok_or_else(|| de::Error::custom(format!("epoch seconds out of range: {seconds}"))),
    }
}

impl From<ProductRequest> for Product {
    fn from(p: ProductRequest) -> Self {
        Self {
            name: p.name,
            quantity: p.quantity,
            unit_price: p.unit_price,
            total_price: p.total_price,
            tax_rate: p.tax_rate,
            tax_value: p.tax_value,
        }
    }
}

impl From<ReceiptRequest> for Receipt {
    fn from(r: ReceiptRequest) -> Self {
        Self {
            number: r.number,
            date: r.date,
            organization: r.organization,
            payment_address: r.payment_address,
            taxpayer_number: r.taxpayer_number,
            taxation_type: r.taxation_type,
            calculation_sign: r.calculation_sign,
            customer_email: r.customer_email,
            fiscal_device_number: r.fiscal_device_number,
            cash_register_number: r.cash_register_number,
            fiscal_document: r.fiscal_document,
            fiscal_attribute: r.fiscal_attribute,
            products: r.products.into_iter().map(Product::from).collect(),
            ..Receipt::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_date_accepts_rfc3339_and_epoch() {
        let text: ReceiptRequest = serde_json::from_value(json!({"date": "2025-07-25T14:40:00+03:00"})).unwrap();
        let epoch: ReceiptRequest = serde_json::from_value(json!({"date": 1753443600})).unwrap();

        assert_eq!(text.date.unwrap().timestamp(), 1753443600);
        assert_eq!(epoch.date.unwrap().timestamp(), 1753443600);
    }

    #[test]
    fn test_missing_fields_take_zero_values() {
        let request: ReceiptRequest = serde_json::from_value(json!({"number": 5})).unwrap();
        assert_eq!(request.number, 5);
        assert!(request.date.is_none());
        assert!(request.products.is_empty());

        let request: ReceiptRequest = serde_json::from_value(json!({"date": null})).unwrap();
        assert!(request.date.is_none());
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        let result = serde_json::from_value::<ReceiptRequest>(json!({"date": "yesterday"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_tax_on_taxed_product_is_invalid() {
        let request = ReceiptRequest {
            products: vec![ProductRequest {
                tax_rate: "20".into(),
                tax_value: -1,
                ..ProductRequest::default()
            }],
            ..ReceiptRequest::default()
        };
        assert!(request.validate().is_err());

        let exempt = ReceiptRequest {
            products: vec![ProductRequest {
                tax_value: -1,
                ..ProductRequest::default()
            }],
            ..ReceiptRequest::default()
        };
        assert!(exempt.validate().is_ok());
    }

    #[test]
    fn test_fields_map_to_like_named_fields() {
        let request: ReceiptRequest = serde_json::from_value(json!({
            "number": 1,
            "organization": "ООО Ромашка",
            "payment_address": "г. Москва",
            "customer_email": "Happy_Customer@mail.ru",
            "products": [{"name": "мыло", "quantity": 5, "unit_price": 8000, "total_price": 40000, "tax_rate": "20", "tax_value": 8000}]
        }))
        .unwrap();

        let receipt = Receipt::from(request);
        assert_eq!(receipt.organization, "ООО Ромашка");
        assert_eq!(receipt.payment_address, "г. Москва");
        assert_eq!(receipt.customer_email, "Happy_Customer@mail.ru");
        assert_eq!(receipt.products[0].total_price, 40000);
        assert_eq!(receipt.products[0].tax_rate, "20");
    }
}
