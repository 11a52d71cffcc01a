pub mod job_status;
pub mod messages;
pub mod output_folder;
pub mod system;
