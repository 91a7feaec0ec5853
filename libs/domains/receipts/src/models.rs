use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use stream_worker::StreamJob;
use uuid::Uuid;

/// Line item. Prices and tax are integer minor units.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub total_price: i64,
    /// Empty for tax exempt items
    pub tax_rate: String,
    pub tax_value: i64,
}

impl Product {
    pub fn is_taxed(&self) -> bool {
        !self.tax_rate.is_empty()
    }
}

/// Tax subtotal for one rate label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tax {
    pub rate: String,
    pub value: i64,
}

/// A fiscal receipt, the event carried on the receipts topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: Uuid,
    pub number: i64,
    pub date: Option<DateTime<FixedOffset>>,
    pub organization: String,
    pub payment_address: String,
    pub taxpayer_number: String,
    pub taxation_type: String,
    pub calculation_sign: String,
    pub customer_email: String,
    pub fiscal_device_number: String,
    pub cash_register_number: String,
    pub fiscal_document: String,
    pub fiscal_attribute: String,
    pub products: Vec<Product>,
}

impl Default for Receipt {
    fn default() -> Self {
        Self::new()
    }
}

impl Receipt {
    /// Empty receipt with a fresh identifier.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            number: 0,
            date: None,
            organization: String::new(),
            payment_address: String::new(),
            taxpayer_number: String::new(),
            taxation_type: String::new(),
            calculation_sign: String::new(),
            customer_email: String::new(),
            fiscal_device_number: String::new(),
            cash_register_number: String::new(),
            fiscal_document: String::new(),
            fiscal_attribute: String::new(),
            products: Vec::new(),
        }
    }

    pub fn total_price(&self) -> i64 {
        self.products.iter().map(|p| p.total_price).sum()
    }

    /// Tax summed per non-empty rate label, sorted by label.
    pub fn total_tax(&self) -> Vec<Tax> {
        let mut by_rate: HashMap<&str, i64> = HashMap::new();
        for product in self.products.iter().filter(|p| p.is_taxed()) {
            *by_rate.entry(product.tax_rate.as_str()).or_default() += product.tax_value;
        }

        let mut taxes: Vec<Tax> = by_rate
            .into_iter()
            .map(|(rate, value)| Tax {
                rate: rate.to_string(),
                value,
            })
            .collect();
        taxes.sort_by(|a, b| a.rate.cmp(&b.rate));
        taxes
    }
}

impl StreamJob for Receipt {
    fn job_id(&self) -> String {
        self.id.to_string()
    }
}
