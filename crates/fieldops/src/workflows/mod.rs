pub mod service_report;
