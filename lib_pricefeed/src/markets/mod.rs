//! # Market Data Model
//!
//! Everything the feed knows about a ticker and how tickers travel over the wire.
//!
//! ## Contained Modules:
//!
//! - **`symbol`**: the per-ticker price state and its bootstrap record.
//! - **`message`**: the JSON price update frame.
//! - **`universe`**: the built-in symbol set and the JSON loader for custom sets.
//! - **`deeplink`**: `stocks://symbol/<TICKER>` resolution.

/// Per-ticker price state.
pub mod symbol;
/// The JSON price update frame.
pub mod message;
/// Symbol universe bootstrap.
pub mod universe;
/// Deep-link resolution.
pub mod deeplink;

pub use deeplink::resolve_symbol_link;
pub use message::PriceMessage;
pub use symbol::{PriceDirection, Symbol, SymbolSpec};
pub use universe::{default_universe, load_universe};
