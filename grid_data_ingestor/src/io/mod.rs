pub mod sink;

pub use sink::{CsvSink, DataSink, SinkError};
