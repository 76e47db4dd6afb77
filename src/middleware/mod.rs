mod access;

pub use access::{access_log_middleware, format_access_line};
