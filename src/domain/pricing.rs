//! Pricing - fixed unit-price tables for cost estimation.
//!
//! Generation and retrieval are metered independently, so each gets its own
//! table and its own estimator. Unknown models price at zero rather than
//! failing; the estimate is advisory, never load-bearing.

/// Prices per million units for generation models, as (input, output) USD.
fn generation_prices(model: &str) -> (f64, f64) {
    match model {
        m if m.contains("2.5-flash-lite") => (0.075, 0.30),
        m if m.contains("2.0-flash-lite") => (0.075, 0.30),
        m if m.contains("flash") => (0.15, 0.60),
        _ => (0.0, 0.0),
    }
}

/// Price per thousand units for embedding models, in USD.
fn embedding_price_per_thousand(model: &str) -> f64 {
    match model {
        m if m.contains("text-embedding-004") => 0.000_01,
        _ => 0.0,
    }
}

/// Estimated cost of generation usage, in USD.
pub fn generation_cost(model: &str, prompt_units: u64, completion_units: u64) -> f64 {
    let (input_price, output_price) = generation_prices(model);
    (prompt_units as f64 / 1_000_000.0) * input_price
        + (completion_units as f64 / 1_000_000.0) * output_price
}

/// Estimated cost of embedding usage, in USD.
pub fn embedding_cost(model: &str, total_units: u64) -> f64 {
    (total_units as f64 / 1_000.0) * embedding_price_per_thousand(model)
}
