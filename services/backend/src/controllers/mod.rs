pub mod root;
pub mod song;
pub mod parser;
pub use root::RootController;
pub use song::{BlobCleanupPolicy, SongController, SongOptions};
