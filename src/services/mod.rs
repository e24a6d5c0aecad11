pub mod submission_api;
