//! Message assets
//!
//! Remote images of in-app messages are cached per message id so that a
//! message can be shown without waiting on the network.

mod assets;

pub use assets::{
    is_downloadable_asset, message_namespace, AssetDownloadSummary, MessageAssetDownloader,
};
