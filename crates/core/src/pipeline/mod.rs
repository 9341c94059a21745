pub mod build_sheet_use_case;
pub mod pipeline_logger;
pub mod probe_source_use_case;
pub mod sheet_error;
pub mod sheet_request;
