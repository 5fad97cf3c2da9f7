//! Unit tests - Public API pieces exercised without a full binding run

mod descriptor_tests;
mod error_tests;
mod naming_tests;
