mod common;
mod job_tests;
mod quota_tests;
