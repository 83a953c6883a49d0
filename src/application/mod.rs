pub mod auth_service;
pub mod error;
pub mod item_service;
pub mod password;

#[cfg(test)]
mod auth_service_tests;
#[cfg(test)]
mod item_service_tests;
