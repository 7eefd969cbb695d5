pub mod account_service;
pub mod proctor_service;
pub mod session_store;
pub mod session_watchdog;
