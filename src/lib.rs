// Library for tests to access modules

pub mod collector;
pub mod config;
pub mod discovery;
pub mod models;
pub mod mqtt;
pub mod routes;
pub mod sysinfo_repo;
pub mod version;
pub mod worker;
