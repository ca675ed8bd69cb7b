pub mod capture_loop;
pub mod frame_clock;
pub mod loop_logger;
pub mod loop_state;
