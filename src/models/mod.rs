pub mod ad;
pub mod backlog;
pub mod batch;
pub mod loaders;
pub mod validation;

pub use ad::{AdPayload, AdRecord, Column, PublishStatus};
pub use backlog::Backlog;
pub use batch::{partition, Batch};
pub use loaders::{
    load_backlog, open_store, save_backlog, BacklogFormat, BacklogStore, CsvStore, XlsxStore,
};
pub use validation::{validate_backlog, ValidationIssue, ValidationReport};
