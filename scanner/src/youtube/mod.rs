pub mod client;
pub mod types;
mod video_id;

pub use client::{VideoCommentSource, YoutubeClient};
pub use types::VideoMeta;
pub use video_id::parse_video_id;
