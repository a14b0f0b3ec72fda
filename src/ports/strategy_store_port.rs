//! Persistence port for user-authored strategies.

use crate::domain::error::ScreenerError;
use crate::domain::strategy::Strategy;

/// CRUD store for custom strategies. The scan engine only ever reads.
pub trait StrategyStore {
    /// Stores a new strategy and returns its assigned id.
    fn create(&self, strategy: &Strategy) -> Result<String, ScreenerError>;

    fn get(&self, id: &str) -> Result<Strategy, ScreenerError>;

    fn list(&self) -> Result<Vec<Strategy>, ScreenerError>;

    /// Replaces the strategy stored under `id`.
    fn update(&self, id: &str, strategy: &Strategy) -> Result<(), ScreenerError>;

    fn delete(&self, id: &str) -> Result<(), ScreenerError>;
}
