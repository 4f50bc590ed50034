pub mod name_email;
pub mod table;
