//! # Calorizer Telegram Bot
//!
//! A Telegram bot that collects a user's physical profile through a guided
//! conversation and estimates daily calorie needs with four formulas. Profiles are
//! stored in PostgreSQL and can feed static or AI-generated nutrition advice.

pub mod bot;
pub mod circuit_breaker;
pub mod collaborators;
pub mod config;
pub mod db;
pub mod dialogue;
pub mod errors;
pub mod flow_engine;
pub mod formulas;
pub mod localization;
pub mod profile;
pub mod recommendation;
pub mod report;
pub mod session_store;
pub mod validation;
