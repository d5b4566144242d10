//! # Symbol Universe
//!
//! The fixed set of tickers tracked during a session. A universe is either the
//! built-in list below or a JSON array of [`SymbolSpec`] read from disk.

use std::fs;
use std::path::Path;

use rust_decimal::Decimal;

use crate::error::FeedError;
use crate::markets::symbol::SymbolSpec;

/// Ticker, company name, description, opening price in cents.
const DEFAULT_SYMBOLS: &[(&str, &str, &str, i64)] = &[
    ("AAPL", "Apple Inc.", "Apple designs, manufactures, and markets smartphones, personal computers, tablets, wearables, and accessories worldwide.", 17872),
    ("GOOG", "Alphabet Inc.", "Alphabet is a multinational conglomerate and parent company of Google, specializing in internet services, cloud computing, and AI.", 14180),
    ("TSLA", "Tesla Inc.", "Tesla designs, develops, manufactures, and sells electric vehicles, energy storage systems, and solar products.", 24842),
    ("AMZN", "Amazon.com Inc.", "Amazon is a global technology company focused on e-commerce, cloud computing (AWS), digital streaming, and artificial intelligence.", 17825),
    ("MSFT", "Microsoft Corp.", "Microsoft develops and supports software, services, devices, and solutions including Windows, Azure, and Office 365.", 38847),
    ("NVDA", "NVIDIA Corp.", "NVIDIA designs GPU-accelerated computing platforms for gaming, data centers, automotive, and AI applications.", 49522),
    ("META", "Meta Platforms Inc.", "Meta builds technologies that help people connect through its family of apps including Facebook, Instagram, and WhatsApp.", 36746),
    ("NFLX", "Netflix Inc.", "Netflix is a streaming entertainment service offering TV series, documentaries, feature films, and mobile games.", 48688),
    ("JPM", "JPMorgan Chase & Co.", "JPMorgan Chase is a global financial services firm offering investment banking, asset management, and consumer banking.", 17296),
    ("V", "Visa Inc.", "Visa operates a global payments technology network facilitating electronic funds transfers worldwide.", 27218),
    ("MA", "Mastercard Inc.", "Mastercard is a global technology company in the payments industry connecting consumers, businesses, and governments.", 42830),
    ("DIS", "The Walt Disney Co.", "Disney is a diversified entertainment company operating theme parks, media networks, and streaming platforms.", 9364),
    ("PYPL", "PayPal Holdings Inc.", "PayPal operates a digital payments platform enabling online money transfers and serving as an electronic alternative to traditional methods.", 6247),
    ("INTC", "Intel Corp.", "Intel designs and manufactures semiconductor chips and related technologies for computing and communications.", 4238),
    ("AMD", "Advanced Micro Devices Inc.", "AMD develops high-performance computing and graphics solutions for data centers, gaming, and embedded applications.", 14893),
    ("CRM", "Salesforce Inc.", "Salesforce provides cloud-based customer relationship management software and enterprise applications.", 27265),
    ("ORCL", "Oracle Corp.", "Oracle provides cloud infrastructure, database management systems, and enterprise software products worldwide.", 11824),
    ("CSCO", "Cisco Systems Inc.", "Cisco designs, manufactures, and sells networking hardware, software, and telecommunications equipment.", 5087),
    ("ADBE", "Adobe Inc.", "Adobe provides digital media and marketing solutions including Creative Cloud, Document Cloud, and Experience Cloud.", 57032),
    ("UBER", "Uber Technologies Inc.", "Uber operates a platform connecting riders with drivers, offering ride-hailing, food delivery, and freight services.", 6158),
    ("BA", "The Boeing Co.", "Boeing designs, manufactures, and sells airplanes, rotorcraft, rockets, satellites, and related systems worldwide.", 21674),
    ("SBUX", "Starbucks Corp.", "Starbucks operates an international chain of coffeehouses and roastery reserves, selling specialty coffee and food items.", 9782),
    ("NKE", "Nike Inc.", "Nike designs, develops, and markets athletic footwear, apparel, equipment, and accessories globally.", 10623),
    ("SNAP", "Snap Inc.", "Snap operates Snapchat, a visual messaging and camera platform for communication and augmented reality experiences.", 1467),
    ("SPOT", "Spotify Technology S.A.", "Spotify is a digital music streaming service providing access to millions of songs, podcasts, and videos.", 18894),
];

/// The built-in 25-symbol universe.
pub fn default_universe() -> Vec<SymbolSpec> {
    DEFAULT_SYMBOLS
        .iter()
        .map(|(id, name, description, cents)| {
            SymbolSpec::new(id, name, description, Decimal::new(*cents, 2))
        })
        .collect()
}

/// Reads a universe from a JSON file holding an array of symbol specs.
pub fn load_universe(path: &Path) -> Result<Vec<SymbolSpec>, FeedError> {
    let raw = fs::read_to_string(path).map_err(|e| {
        FeedError::InvalidUniverse(format!("cannot read {}: {}", path.display(), e))
    })?;
    let specs: Vec<SymbolSpec> = serde_json::from_str(&raw).map_err(|e| {
        FeedError::InvalidUniverse(format!("cannot parse {}: {}", path.display(), e))
    })?;
    Ok(specs)
}
