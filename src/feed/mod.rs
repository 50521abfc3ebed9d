pub mod synthetic;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::market::MarketBundle;

pub use synthetic::SyntheticFeed;

/// The market-data collaborator. One bundle per call; the engine runs
/// one tick per bundle.
#[async_trait]
pub trait MarketFeed: Send {
    async fn next_bundle(&mut self) -> Result<MarketBundle>;
}
