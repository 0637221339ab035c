pub mod announcements;
pub mod attachments;
pub mod auth;
pub mod engagement;
pub mod root;
pub mod types;
