pub mod comment;
pub mod password_reset;
pub mod post;
pub mod postgres_repository;
pub mod session;
pub mod settings;
pub mod taxonomy;
pub mod user;
