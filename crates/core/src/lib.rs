pub mod capture;
pub mod detection;
pub mod overlay;
pub mod pipeline;
pub mod recording;
pub mod session;
pub mod shared;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;
