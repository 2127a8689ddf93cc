pub mod drives;
pub mod manager;
pub mod models;

pub use drives::list_drives;
pub use manager::{FileManager, DEFAULT_MAX_WALK_DEPTH};
pub use models::{
    CopyPasteRequest, CreateDirOutcome, CreateDirRequest, DeleteRequest, Drive, Entry, OneOrMany,
    PathQuery, RenameRequest,
};
