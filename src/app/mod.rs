pub mod ports;
pub mod list_reports_use_case;
pub mod seed_use_case;
pub mod sign_in_use_case;
pub mod submit_report_use_case;
