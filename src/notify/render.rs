//! Message rendering for the Telegram MarkdownV2 dialect.

use chrono::{Local, TimeZone};

use crate::blockchain::address::{explorer_tx_url, explorer_url, same_address, shorten, token_url};
use crate::storage::TransactionDetails;

const RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

/// Rendered notification body plus the explorer link for its button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub text: String,
    pub link_url: String,
}

/// Escape text for MarkdownV2.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a URL for the target part of an inline link.
fn escape_url(url: &str) -> String {
    url.replace('\\', "\\\\").replace(')', "\\)")
}

/// Format `amount` smallest units as a decimal with `decimals` places.
///
/// The integer part is grouped with `,` and trailing fractional zeros are
/// dropped, so `(150000000, 8)` renders as `1.5`.
pub fn format_amount(amount: u128, decimals: u8) -> String {
    let scale = 10u128.pow(u32::from(decimals.min(38)));
    let whole = amount / scale;
    let frac = amount % scale;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if frac == 0 {
        return grouped;
    }
    let frac = format!("{:0width$}", frac, width = usize::from(decimals));
    format!("{}.{}", grouped, frac.trim_end_matches('0'))
}

fn linked_address(address: &str) -> String {
    let label = escape(&shorten(address));
    match explorer_url(address) {
        Some(url) => format!("[{}]({})", label, escape_url(&url)),
        None => label,
    }
}

/// Render a stored transaction, with the date in the local time zone.
pub fn render_message(details: &TransactionDetails) -> RenderedMessage {
    render_message_in(details, &Local)
}

/// Render a stored transaction, with the date in `tz`.
pub fn render_message_in<Tz>(details: &TransactionDetails, tz: &Tz) -> RenderedMessage
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let wallet = &details.wallet;
    let outgoing = same_address(&details.from_address, &wallet.address);
    let wallet_suffix = format!(" • {}", escape(&wallet.name));

    let mut lines = Vec::with_capacity(details.amounts.len() + 4);
    lines.push(format!(
        "{} • {}",
        escape(wallet.host.as_str()),
        escape(details.token.chain.as_str())
    ));
    lines.push(format!(
        "{} from {}{}",
        if outgoing { "Sent" } else { "Received" },
        linked_address(&details.from_address),
        if outgoing { wallet_suffix.as_str() } else { "" },
    ));

    let symbol = match token_url(&details.token.address) {
        Some(url) => format!("[{}]({})", escape(&details.token.symbol), escape_url(&url)),
        None => escape(&details.token.symbol),
    };

    let mut amounts: Vec<_> = details.amounts.iter().collect();
    amounts.sort_by_key(|(to, _)| !same_address(to, &wallet.address));
    for (to, amount) in amounts {
        let incoming = same_address(to, &wallet.address);
        lines.push(format!(
            "{} {} to {}{}",
            escape(&format_amount(*amount, details.token.decimals)),
            symbol,
            linked_address(to),
            if incoming { wallet_suffix.as_str() } else { "" },
        ));
    }

    lines.push(String::new());
    let date = tz
        .timestamp_opt(details.timestamp, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S %:z").to_string())
        .unwrap_or_else(|| details.timestamp.to_string());
    lines.push(format!("Transaction date: _{}_", escape(&date)));

    RenderedMessage {
        text: lines.join("\n"),
        link_url: explorer_tx_url(details.token.chain, &details.hash),
    }
}
