// Library exports for the binary and tests

pub mod auth;
pub mod backend;
pub mod config;
pub mod models;
pub mod monitoring;
pub mod stats;
pub mod ui;
pub mod views;
pub mod web;

#[cfg(test)]
pub mod test_utils;
