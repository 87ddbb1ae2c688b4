//! HTTP client for the social platform's v2 REST API.

pub mod client;
pub mod types;

pub use client::HttpSocialApi;
