pub mod compass;
pub mod config;
pub mod i2c;
