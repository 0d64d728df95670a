//! 内存存储

pub mod accrual_registry;

pub use accrual_registry::{AccrualRegistry, RegistryError};
