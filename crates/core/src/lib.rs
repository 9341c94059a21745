pub mod jobs;
pub mod layout;
pub mod pipeline;
pub mod sampling;
pub mod shared;
pub mod video;
