pub mod auth;
pub mod client_ip;
pub mod rate_limit;
pub mod request_logger;
