//! Canonical tables for electricity market data and the network-free steps
//! that produce them: DST-aware localization, range splitting, column maps
//! and interval normalization.

#![deny(missing_docs)]

pub mod columns;
pub mod error;
pub mod frequency;
pub mod market;
pub mod normalize;
pub mod queue;
pub mod range;
pub mod table;
pub mod tz;

pub use columns::{ColumnMap, Schema};
pub use error::{DstError, SchemaError};
pub use frequency::Frequency;
pub use market::{Market, QueueStatus};
pub use normalize::{LocationFilter, Stamp};
pub use range::{RangePlan, TimeSelector, Window};
pub use table::{Table, Value};
