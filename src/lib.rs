pub mod agent;
pub mod category;
pub mod commands;
pub mod config;
pub mod cron;
pub mod database;
pub mod error;
pub mod formatting;
pub mod llm;
pub mod memory;
pub mod prompts;
pub mod scheduler;
pub mod selector;
pub mod uniqueness;
pub mod verifier;

#[cfg(test)]
mod testing;
