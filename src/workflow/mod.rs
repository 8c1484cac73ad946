pub mod publish_flow;
pub mod row_ctx;

pub use publish_flow::{PublishFlow, RowOutcome, RowReport};
pub use row_ctx::RowCtx;
