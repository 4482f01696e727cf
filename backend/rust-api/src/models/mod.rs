pub mod catalog;
pub mod envelope;
pub mod query;
pub mod write;

pub use envelope::{Envelope, Pagination};
pub use query::{Operation, QueryOptions, QueryRequest};
