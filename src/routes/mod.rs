pub mod account;
pub mod appointments;
pub mod catalog;
pub mod events;
pub mod payments;
