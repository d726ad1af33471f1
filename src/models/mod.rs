pub mod transaction;

pub use transaction::{AnalyzerVerdict, MatchedTransaction};
