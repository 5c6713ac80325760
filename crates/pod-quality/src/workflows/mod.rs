pub mod privacy;
pub mod quality;
pub mod storage;
