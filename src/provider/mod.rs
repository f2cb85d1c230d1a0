pub mod backends;
pub mod template;

pub use template::{AssetProvider, AssetUpload, StoredAsset};
