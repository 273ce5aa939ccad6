pub mod records_service;
pub mod upload_service;

pub use records_service::{
    DeleteRecordCommand, ListRecordsQuery, RecordsService, SaveRecordCommand, UpdateRecordCommand,
};
pub use upload_service::{UploadRecordCommand, UploadService};
