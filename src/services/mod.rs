pub mod account;
pub mod dish;
pub mod guest;
pub mod order;
pub mod payment;
pub mod table;

#[cfg(test)]
pub(crate) mod test_support;
