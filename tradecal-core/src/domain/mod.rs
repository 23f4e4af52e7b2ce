//! Domain types for TradeCal

pub mod baseline;
pub mod ids;
pub mod record;

pub use baseline::AccountBaseline;
pub use ids::{RecordId, Scope};
pub use record::{Direction, RawAmount, RawTimestamp, Record, RecordKind, Status};
