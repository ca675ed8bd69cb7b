pub mod clip;
pub mod media_recorder;
pub mod recorder_event;
