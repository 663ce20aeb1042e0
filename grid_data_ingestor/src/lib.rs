//! Fetch electricity market data from US grid operators and return it as
//! canonical tables.
//!
//! [`facade::GridStatus`] is the entry point. Each operator's endpoints and
//! report layouts live in [`providers`]; the tables, time zone handling and
//! range splitting they share come from `grid_schema`.

pub mod config;
pub mod errors;
pub mod facade;
pub mod http;
pub mod io;
pub mod models;
pub mod providers;

pub use errors::Error;
pub use facade::GridStatus;
pub use models::{
    operator::Operator,
    request::{Dataset, ErrorPolicy, Query, RequestOptions},
};
