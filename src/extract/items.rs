//! Item extraction.
//!
//! Structured markup rows are tried first, then text-line patterns of the
//! "2 x Name ₹499" and "Name Qty: 2" families. A four-column markup row
//! carries a line total in its last cell; for single-quantity rows the
//! stated price doubles as the line total. Items are de-duplicated within
//! the fragment by their dedup key, so a product repeated in the HTML
//! table and the plain-text summary yields one entry.

use regex::Regex;
use rust_decimal::Decimal;

use super::EmailText;
use crate::domain::{ExtractedField, ExtractionDiagnostics, Item};
use crate::normalize;

/// Compiled item-row patterns.
pub(crate) struct ItemScanner {
    markup_row: Regex,
    qty_first: Regex,
    qty_after: Regex,
    bullet: Regex,
}

impl ItemScanner {
    pub(crate) fn new() -> Self {
        Self {
            // <td>Name</td><td>2</td><td>₹499</td> with an optional
            // fourth line-total cell: <td>₹998</td>
            markup_row: Regex::new(concat!(
                r"(?is)<tr[^>]*>\s*<td[^>]*>\s*([^<>]{3,120}?)\s*</td>\s*<td[^>]*>\s*(?:qty:?\s*)?(\d{1,3})\s*</td>\s*<td[^>]*>\s*(?:\u{20B9}|â‚¹|rs\.?|inr|\$|€|£)?\s*([0-9][0-9,]*(?:\.[0-9]{1,2})?)\s*</td>",
                r"(?:\s*<td[^>]*>\s*(?:\u{20B9}|â‚¹|rs\.?|inr|\$|€|£)?\s*([0-9][0-9,]*(?:\.[0-9]{1,2})?)\s*</td>)?",
            ))
            .unwrap(),
            // 2 x Desk Lamp ₹499
            qty_first: Regex::new(
                r"(?im)^\s*(\d{1,3})\s*[x×]\s*(.{3,100}?)\s+(?:\u{20B9}|â‚¹|rs\.?|inr|\$|€|£)\s*([0-9][0-9,]*(?:\.[0-9]{1,2})?)\s*$",
            )
            .unwrap(),
            // Desk Lamp Qty: 2 ₹998  (price optional)
            qty_after: Regex::new(
                r"(?im)^\s*(.{3,100}?)\s*[-–]?\s*qty[:.]?\s*(\d{1,3})(?:\s.*?(?:\u{20B9}|â‚¹|rs\.?|inr|\$|€|£)\s*([0-9][0-9,]*(?:\.[0-9]{1,2})?))?\s*$",
            )
            .unwrap(),
            // - Desk Lamp ₹804
            bullet: Regex::new(
                r"(?im)^\s*[-•*]\s*(.{3,100}?)\s+(?:\u{20B9}|â‚¹|rs\.?|inr|\$|€|£)\s*([0-9][0-9,]*(?:\.[0-9]{1,2})?)\s*$",
            )
            .unwrap(),
        }
    }

    /// Extracts and de-duplicates items from the email.
    pub(crate) fn scan(
        &self,
        text: &EmailText,
        max_name_chars: usize,
        diagnostics: &mut ExtractionDiagnostics,
    ) -> Vec<Item> {
        let mut collector = ItemCollector {
            items: Vec::new(),
            seen: Vec::new(),
            max_name_chars,
            diagnostics,
        };

        if let Some(html) = &text.html {
            for caps in self.markup_row.captures_iter(html) {
                let name = normalize::decode_entities(&caps[1]);
                let quantity = caps[2].parse::<u32>().unwrap_or(1).max(1);
                let total = caps.get(4).and_then(|p| parse_price(p.as_str()));
                collector.push(&name, quantity, parse_price(&caps[3]), total, "structured_markup");
            }
        }

        for caps in self.qty_first.captures_iter(&text.body) {
            let quantity = caps[1].parse::<u32>().unwrap_or(1).max(1);
            collector.push(&caps[2], quantity, parse_price(&caps[3]), None, "text_line");
        }

        for caps in self.qty_after.captures_iter(&text.body) {
            let quantity = caps[2].parse::<u32>().unwrap_or(1).max(1);
            let price = caps.get(3).and_then(|p| parse_price(p.as_str()));
            collector.push(&caps[1], quantity, price, None, "text_line");
        }

        for caps in self.bullet.captures_iter(&text.body) {
            collector.push(&caps[1], 1, parse_price(&caps[2]), None, "text_line");
        }

        collector.items
    }
}

fn parse_price(raw: &str) -> Option<Decimal> {
    raw.replace(',', "").parse::<Decimal>().ok()
}

struct ItemCollector<'d> {
    items: Vec<Item>,
    seen: Vec<String>,
    max_name_chars: usize,
    diagnostics: &'d mut ExtractionDiagnostics,
}

impl ItemCollector<'_> {
    fn push(
        &mut self,
        raw_name: &str,
        quantity: u32,
        unit_price: Option<Decimal>,
        total_price: Option<Decimal>,
        strategy: &'static str,
    ) {
        let name = normalize::clean_text(normalize::truncate_chars(
            raw_name.trim(),
            self.max_name_chars,
        ));
        if name.len() < 3 || !name.chars().any(|c| c.is_alphabetic()) {
            return;
        }
        // A single-quantity row's stated price is its line total.
        let total_price = total_price.or_else(|| unit_price.filter(|_| quantity == 1));
        let item = Item {
            name,
            quantity,
            unit_price,
            total_price,
        };
        let key = item.dedup_key();
        if self.seen.contains(&key) {
            return;
        }
        if self.items.is_empty() {
            self.diagnostics.used(ExtractedField::Items, strategy);
        }
        self.seen.push(key);
        self.items.push(item);
    }
}
