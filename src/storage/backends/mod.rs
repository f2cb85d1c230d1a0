pub mod memory;
pub mod mongo;
mod register;

pub use register::StoreConfigs;
