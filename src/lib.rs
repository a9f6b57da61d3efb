//! Video Content Package Generator
//!
//! This library provides the core functionality for the scriptforge system,
//! which turns a source video script into a finished content package
//! (outline, narrative script, SEO metadata, video-generation prompts,
//! thumbnail) by driving a pipeline of Google Gemini calls per job.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
