pub mod announcement;
pub mod notification;
pub mod user;

pub use announcement::*;
pub use notification::*;
pub use user::*;
