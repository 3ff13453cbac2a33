//! Application services for the administrative surface.

pub mod posts;
pub mod users;

pub use posts::{AdminPostService, CreatePostCommand};
pub use users::{AdminUserService, CreateUserCommand, UpdateUserCommand, UserListParams};
