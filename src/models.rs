pub mod auth;
pub mod inventory;
pub mod orders;
pub mod rbac;
