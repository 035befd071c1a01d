pub mod auth;
pub mod content;
pub mod credentials;
pub mod validation;
