pub mod device;
pub mod listeners;
