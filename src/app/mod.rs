pub mod health;
pub mod store;
pub mod webapi;
