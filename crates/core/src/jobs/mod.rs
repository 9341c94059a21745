pub mod engine_factory;
pub mod job_id;
pub mod job_runner;
pub mod job_store;
pub mod progress;
pub mod source_stager;
