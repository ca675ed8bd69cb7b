pub mod camera;
pub mod live_stream;
