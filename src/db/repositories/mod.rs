pub mod history_logs;
pub mod profiles;
