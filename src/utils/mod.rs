pub mod setting;
pub mod tables;
