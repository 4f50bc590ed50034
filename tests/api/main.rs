mod auth;
mod guest;
mod health_check;
mod helper;
mod order;
mod socket;
mod table;
mod transaction;
