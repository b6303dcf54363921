pub mod conversation;
pub mod route;
pub mod tool;
