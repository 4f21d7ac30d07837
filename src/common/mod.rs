// Constants and helpers shared by every module
pub mod constants;
pub mod utils;
