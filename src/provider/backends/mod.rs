pub mod cloudinary;
pub mod filesystem;
mod register;

pub use register::{Credentials, ProviderConfigs};
