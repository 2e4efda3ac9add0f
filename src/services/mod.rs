//! Service components for the artwork training lifecycle

pub mod cms_files;
pub mod coordinator;
pub mod image_ingestor;
pub mod tag_manager;
pub mod variants;
pub mod vision_client;

pub use cms_files::{CmsFilesClient, FileRecord};
pub use coordinator::{LifecycleCoordinator, PollPolicy};
pub use image_ingestor::ImageIngestor;
pub use tag_manager::TagManager;
pub use vision_client::CustomVisionClient;
