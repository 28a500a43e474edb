pub mod config;
pub mod connect;
pub mod create;
pub mod status;
pub mod verify;
