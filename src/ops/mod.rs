pub mod activity_ops;
pub mod autosave;
pub mod board;
pub mod chat_ops;
pub mod finance;
pub mod portal;
pub mod sales_ops;
pub mod status;
pub mod timeline;
