//! Plain text rendering of a receipt for the email body.
//!
//! Output is a pure function of the receipt. Missing inputs (no date, empty
//! strings) render as empty lines instead of failing.

use crate::models::Receipt;
use crate::money::format_minor_units;
use std::fmt;

pub const DATE_LAYOUT: &str = "%m.%d.%y %H:%M";
pub const PAYMENT_METHOD: &str = "Безналичными";

/// Display adapter that writes the receipt text.
pub struct ReceiptText<'a>(pub &'a Receipt);

impl fmt::Display for ReceiptText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;

        writeln!(f, "Кассовый чек № {}", r.number)?;
        match r.date {
            Some(date) => writeln!(f, "{}", date.format(DATE_LAYOUT))?,
            None => writeln!(f)?,
        }
        writeln!(f)?;

        writeln!(f, "{}", r.organization)?;
        writeln!(f, "{}", r.payment_address)?;
        writeln!(f, "ИНН {}", r.taxpayer_number)?;
        writeln!(f, "Вид налогообложения: {}", r.taxation_type)?;
        writeln!(f)?;

        writeln!(f, "{}", r.calculation_sign.to_uppercase())?;
        writeln!(f)?;

        for product in &r.products {
            writeln!(f, "{}", product.name)?;
            writeln!(f, "{} x {}", product.quantity, format_minor_units(product.unit_price))?;
            writeln!(f, "={}", format_minor_units(product.total_price))?;
            if product.is_taxed() {
                writeln!(f, "в т.ч. НДС {}", product.tax_rate)?;
                writeln!(f, "= {}", format_minor_units(product.tax_value))?;
            } else {
                writeln!(f, "без НДС")?;
            }
            writeln!(f)?;
        }

        let total = format_minor_units(r.total_price());
        writeln!(f, "--")?;
        writeln!(f, "ИТОГ ={total}")?;
        for tax in r.total_tax() {
            writeln!(f, "в т.ч. НДС {} ={}", tax.rate, format_minor_units(tax.value))?;
        }
        writeln!(f, "{PAYMENT_METHOD} ={total}")?;
        writeln!(f)?;

        writeln!(f, "Электронный адрес покупателя")?;
        writeln!(f, "{}", r.customer_email.to_lowercase())?;
        writeln!(f)?;

        writeln!(f, "ФН: {}", r.fiscal_device_number)?;
        writeln!(f, "РН ККТ: {}", r.cash_register_number)?;
        writeln!(f, "ФД: {}", r.fiscal_document)?;
        writeln!(f, "ФПД: {}", r.fiscal_attribute)
    }
}

/// Render the receipt as the plain text email body.
pub fn render_text(receipt: &Receipt) -> String {
    ReceiptText(receipt).to_string()
}
