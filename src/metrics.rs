use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, Encoder, Histogram, IntCounter, TextEncoder,
};

lazy_static! {
    pub static ref TOKEN_REWARDS_TOTAL: IntCounter = register_int_counter!(
        "reward_engine_token_rewards_total",
        "Confirmed on-chain token reward transfers"
    )
    .expect("metric can be registered");
    pub static ref CURRENCY_REWARDS_TOTAL: IntCounter = register_int_counter!(
        "reward_engine_currency_rewards_total",
        "Off-chain currency balance credits"
    )
    .expect("metric can be registered");
    pub static ref WALLETS_GENERATED_TOTAL: IntCounter = register_int_counter!(
        "reward_engine_wallets_generated_total",
        "Wallet addresses generated for users without one"
    )
    .expect("metric can be registered");
    pub static ref TRANSFER_CONFIRMATION_SECONDS: Histogram = register_histogram!(
        "reward_engine_transfer_confirmation_seconds",
        "Time spent waiting for transfer inclusion on chain"
    )
    .expect("metric can be registered");
}

pub fn metrics_handler() -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}
