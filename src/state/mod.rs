mod bookmarks;

pub use bookmarks::{Bookmark, CheckpointStore, TapState};
