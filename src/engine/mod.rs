pub mod aggregator;
pub mod assembly;
mod error;
mod router;

#[cfg(test)]
mod tests;

pub use aggregator::{RouteAggregator, RouteMaps, VenueOutput, VenueQuoteFailure, VenueRoute};
pub use error::{EngineError, EngineResult};
pub use router::{
    PreparedSwap, RouteManager, RouteOutcome, RouteSelection, RouteWinner, RouterSettings,
    SWAP_GAS_BUDGET, SwapParams,
};
