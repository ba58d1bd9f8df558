pub mod client;
pub mod config;
pub mod db;
pub mod handler;
pub mod schema;
pub mod submission;

#[cfg(test)]
mod tests;
