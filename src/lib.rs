pub mod cache;
pub mod config;
pub mod fetch;
pub mod output;
pub mod parser;
pub mod publish;
pub mod transform;
