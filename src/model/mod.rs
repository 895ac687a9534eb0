pub mod card;
pub mod comment;
pub mod config;
pub mod id;
pub mod project;
pub mod report;
pub mod task;
pub mod user;

pub use card::*;
pub use comment::*;
pub use config::*;
pub use id::*;
pub use project::*;
pub use report::*;
pub use task::*;
pub use user::*;
