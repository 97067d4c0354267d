//! The swap orchestrator: drives one party's side of an atomic
//! cross-chain swap end to end, funding the leg this party gives and
//! reacting to the leg the counterparty gives.

mod config;
mod engine_config;
mod error;
mod orchestrator;
mod outcome;

pub use config::{FeePriority, GiveCurrency, Role, SecretRole, SwapConfig};
pub use engine_config::EngineConfig;
pub use error::SwapError;
pub use orchestrator::SwapOrchestrator;
pub use outcome::SwapOutcome;
