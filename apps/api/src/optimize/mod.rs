pub mod diff;
pub mod handlers;
pub mod json_scan;
pub mod normalizer;
pub mod optimizer;
pub mod patcher;
pub mod prompt_builder;
pub mod prompts;
pub mod review;
