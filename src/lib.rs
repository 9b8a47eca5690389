pub mod api;
pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod controller;
pub mod form;
pub mod model;
pub mod notify;
pub mod query;
pub mod render;
pub mod selection;
pub mod settings;

#[cfg(test)]
mod tests;
