pub mod market_source;
pub mod yahoo;
