mod handler;
mod model;

pub use handler::{create_user, delete_user, update_user, view_user};
pub use model::{User, UserWithProperties};
