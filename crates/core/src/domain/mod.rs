pub mod contract;
pub mod query;
pub mod recommendation;
