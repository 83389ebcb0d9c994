pub mod barrier;
pub mod buffer;
pub mod command_buffer;
pub mod format;
pub mod image;
pub mod release_queue;
