use crate::protocol::types::{Mail, MailItem};

/// Black-market rows as `price,amount,item`, no header, newline separated.
pub fn render_csv<'a, I>(items: I) -> String
where
    I: IntoIterator<Item = &'a MailItem>,
{
    items
        .into_iter()
        .filter(|item| item.black_market)
        .map(csv_row)
        .collect::<Vec<String>>()
        .join("\n")
}

pub fn csv_row(item: &MailItem) -> String {
    format!("{},{},{}", item.price, item.amount, escape_csv(&item.item))
}

/// Quotes the field when it holds a comma, quote or newline, doubling inner quotes.
pub fn escape_csv(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Pretty-printed JSON array of mails.
pub fn render_json(mails: &[Mail]) -> String {
    match serde_json::to_string_pretty(mails) {
        Ok(json) => json,
        Err(e) => {
            // Mail only holds strings, numbers and timestamps, so this is not expected.
            log::error!("[Exporter] Failed to serialize {} mails: {}", mails.len(), e);
            "[]".to_string()
        }
    }
}
