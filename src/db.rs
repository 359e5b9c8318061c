pub mod inventory_repo;
pub use inventory_repo::InventoryRepository;
pub mod user_repo;
pub use user_repo::UserRepository;
pub mod rbac_repo;
pub use rbac_repo::RbacRepository;
pub mod order_repo;
pub use order_repo::OrderRepository;
