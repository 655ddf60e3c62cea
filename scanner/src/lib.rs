pub mod app_config;
pub mod comment;
pub mod error;
pub mod pipeline;
pub mod prompt;
pub mod rate_limiters;
pub mod report;
pub mod youtube;

#[cfg(test)]
mod testing;

pub type HttpClient = reqwest::Client;
