//! Ticker symbol to CoinGecko id mapping

/// Well-known tickers and their CoinGecko ids
const KNOWN_COINS: &[(&str, &str)] = &[
    ("btc", "bitcoin"),
    ("eth", "ethereum"),
    ("usdt", "tether"),
    ("usdc", "usd-coin"),
    ("bnb", "binancecoin"),
    ("xrp", "ripple"),
    ("sol", "solana"),
    ("ada", "cardano"),
    ("doge", "dogecoin"),
    ("dot", "polkadot"),
];

/// Maps a ticker symbol to the remote source's coin id.
///
/// Unknown symbols are passed through (lowercased) on the assumption that the
/// caller already supplied a coin id; the remote source reports it otherwise.
pub fn resolve(symbol: &str) -> String {
    let symbol = symbol.to_lowercase();
    KNOWN_COINS
        .iter()
        .find(|(ticker, _)| *ticker == symbol)
        .map(|(_, id)| (*id).to_string())
        .unwrap_or(symbol)
}
