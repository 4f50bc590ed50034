pub mod auth;
pub mod dish;
pub mod guest;
pub mod health_check;
pub mod order;
pub mod socket;
pub mod table;
pub mod transaction;
