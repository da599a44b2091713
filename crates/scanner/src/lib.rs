pub mod facade;
pub mod names;


pub use facade::*;
pub use names::*;

// The strategy crates stay usable on their own; the façade re-exports
// the surface most callers need.
pub use contract_eval::ContractDeal;
pub use plex_dashboard::{compute_plex_dashboard, PlexDashboard};
pub use portfolio_analytics::{
    compute_portfolio_pnl, compute_portfolio_risk, PortfolioPnl, PortfolioRiskSummary,
};
pub use route_scanner::FlipResult;
pub use scanner_core::{
    noop_progress, Progress, ScanError, ScanParams, StaticData,
};
pub use station_trading::{
    build_station_command, StationCommandResult, StationTrade,
};
