pub mod batches;
pub mod pipeline;
