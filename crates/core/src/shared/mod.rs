pub mod constants;
pub mod dimensions;
pub mod frame;
