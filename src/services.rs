pub mod auth;
pub mod inventory_service;
pub mod notification;
pub mod order_service;
pub mod permission_service;
pub mod unit_service;
