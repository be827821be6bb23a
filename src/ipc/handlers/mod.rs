pub mod auth;
pub mod core;
pub mod homework;
pub mod roster;
pub mod setup;
