pub mod comment;
pub mod health;
pub mod pagination;
pub mod password_reset;
pub mod post;
pub mod session;
pub mod settings;
pub mod taxonomy;
pub mod user;
