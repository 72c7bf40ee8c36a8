pub mod order;
pub mod property;
pub mod selection;
pub mod service;
