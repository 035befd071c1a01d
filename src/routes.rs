pub mod auth;
pub mod comment;
pub mod error;
pub mod health;
pub mod password_reset;
pub mod post;
pub mod settings;
pub mod taxonomy;
pub mod user;
