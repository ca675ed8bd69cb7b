pub mod ffmpeg_recorder;
mod mp4_encoder;
