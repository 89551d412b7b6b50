//! Address classification and explorer links.
//!
//! Everything here is a pure function of the address string. Ingestion uses
//! `classify` to pick a fetcher; the notifier uses the rest to render
//! shortened, linked addresses.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::blockchain::types::ChainTag;

static BITCOIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(bc1|[13])[a-zA-HJ-NP-Z0-9]{25,39}$").expect("valid regex"));
static TRON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^T[1-9A-HJ-NP-Za-km-z]{33}$").expect("valid regex"));
static ETHEREUM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid regex"));

/// Map an address to the chain whose grammar it matches.
pub fn classify(address: &str) -> Option<ChainTag> {
    if BITCOIN_RE.is_match(address) {
        Some(ChainTag::Bitcoin)
    } else if TRON_RE.is_match(address) {
        Some(ChainTag::Tron)
    } else if ETHEREUM_RE.is_match(address) {
        Some(ChainTag::Ethereum)
    } else {
        None
    }
}

/// Compare two addresses the way their chain does.
///
/// Ethereum hex addresses are case-insensitive (mixed case is only a
/// checksum); base58 and bech32 forms are compared exactly.
pub fn same_address(a: &str, b: &str) -> bool {
    match (classify(a), classify(b)) {
        (Some(ChainTag::Ethereum), Some(ChainTag::Ethereum)) => a.eq_ignore_ascii_case(b),
        _ => a == b,
    }
}

/// Shortened display form of an address.
pub fn shorten(address: &str) -> String {
    match classify(address) {
        Some(ChainTag::Bitcoin) => format!("{}-{}", head(address, 4), tail(address, 4)),
        Some(ChainTag::Tron) => format!("{}..{}", head(address, 4), tail(address, 4)),
        Some(ChainTag::Ethereum) => format!("{}..{}", head(address, 6), tail(address, 4)),
        None => address.to_string(),
    }
}

/// Explorer page for an address, if the address is recognized.
pub fn explorer_url(address: &str) -> Option<String> {
    match classify(address)? {
        ChainTag::Bitcoin => Some(format!(
            "https://www.blockchain.com/explorer/addresses/btc/{}",
            address
        )),
        ChainTag::Tron => Some(format!("https://tronscan.org/#/address/{}", address)),
        ChainTag::Ethereum => Some(format!("https://etherscan.io/address/{}", address)),
    }
}

/// Explorer page for a transaction on `chain`.
pub fn explorer_tx_url(chain: ChainTag, hash: &str) -> String {
    match chain {
        ChainTag::Bitcoin => format!(
            "https://www.blockchain.com/explorer/transactions/btc/{}",
            hash
        ),
        ChainTag::Tron => format!("https://tronscan.org/#/transaction/{}", hash),
        ChainTag::Ethereum => format!("https://etherscan.io/tx/{}", hash),
    }
}

/// Explorer page for a token contract. Native coin pseudo-addresses have none.
pub fn token_url(token_address: &str) -> Option<String> {
    match classify(token_address)? {
        ChainTag::Tron => Some(format!("https://tronscan.org/#/contract/{}", token_address)),
        ChainTag::Ethereum => Some(format!("https://etherscan.io/token/{}", token_address)),
        ChainTag::Bitcoin => None,
    }
}

fn head(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

fn tail(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    match s.char_indices().nth(count - n) {
        Some((i, _)) => &s[i..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BTC: &str = "1BoatSLRHtKNngkdXEeobR76b53LETtpyT";
    const TRON: &str = "TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7";
    const ETH: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";

    #[test]
    fn test_classify_known_grammars() {
        assert_eq!(classify(BTC), Some(ChainTag::Bitcoin));
        assert_eq!(classify("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq"), Some(ChainTag::Bitcoin));
        assert_eq!(classify("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy"), Some(ChainTag::Bitcoin));
        assert_eq!(classify(TRON), Some(ChainTag::Tron));
        assert_eq!(classify(ETH), Some(ChainTag::Ethereum));
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify("not-an-address"), None);
        assert_eq!(classify(""), None);
        // Tron grammar excludes 0, O, I and l.
        assert_eq!(classify("TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU0"), None);
        assert_eq!(classify("0x1234"), None);
    }

    #[test]
    fn test_shorten() {
        assert_eq!(shorten(BTC), "1Boa-tpyT");
        assert_eq!(shorten(TRON), "TLa2..YjU7");
        assert_eq!(shorten(ETH), "0xdAC1..1ec7");
        assert_eq!(shorten("not-an-address"), "not-an-address");
    }

    #[test]
    fn test_explorer_urls() {
        assert_eq!(
            explorer_url(TRON).unwrap(),
            format!("https://tronscan.org/#/address/{}", TRON)
        );
        assert!(explorer_url("nope").is_none());
        assert_eq!(
            explorer_tx_url(ChainTag::Bitcoin, "abc"),
            "https://www.blockchain.com/explorer/transactions/btc/abc"
        );
        assert!(token_url(TRON).is_some());
        assert!(token_url("bitcoin").is_none());
    }

    #[test]
    fn test_same_address() {
        assert!(same_address(ETH, &ETH.to_lowercase()));
        assert!(same_address(TRON, TRON));
        assert!(!same_address(TRON, &TRON.to_lowercase()));
    }
}
