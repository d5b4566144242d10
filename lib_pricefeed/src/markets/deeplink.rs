//! # Deep Links
//!
//! Resolves `stocks://symbol/<TICKER>` locators to a tracked ticker. Anything else,
//! including links to tickers the feed does not know, resolves to `None`.

use url::Url;

const LINK_SCHEME: &str = "stocks";
const LINK_HOST: &str = "symbol";

/// Returns the ticker addressed by `link` if `is_known` accepts it.
pub fn resolve_symbol_link<F>(link: &str, is_known: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    let url = Url::parse(link).ok()?;
    if url.scheme() != LINK_SCHEME || url.host_str() != Some(LINK_HOST) {
        return None;
    }

    let ticker = url.path_segments()?.find(|segment| !segment.is_empty())?;
    if is_known(ticker) {
        Some(ticker.to_string())
    } else {
        tracing::debug!(link, ticker, "Deep link addresses an unknown symbol");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(ticker: &str) -> bool {
        matches!(ticker, "AAPL" | "V")
    }

    #[test]
    fn test_resolves_known_symbol() {
        assert_eq!(resolve_symbol_link("stocks://symbol/AAPL", known), Some("AAPL".to_string()));
        assert_eq!(resolve_symbol_link("stocks://symbol/V/", known), Some("V".to_string()));
    }

    #[test]
    fn test_rejects_unknown_or_foreign_links() {
        assert_eq!(resolve_symbol_link("stocks://symbol/ZZZZ", known), None);
        assert_eq!(resolve_symbol_link("stocks://symbol/", known), None);
        assert_eq!(resolve_symbol_link("stocks://quote/AAPL", known), None);
        assert_eq!(resolve_symbol_link("https://symbol/AAPL", known), None);
        assert_eq!(resolve_symbol_link("not a url", known), None);
    }
}
