//! Card Journey Engine
//!
//! Drives a category-by-category credit card questionnaire: captures spend
//! answers into a profile, scores how complete it is, gates categories on
//! eligibility data, fetches and normalizes ranked card recommendations and
//! advances through the chosen categories.
//!
//! # Modules
//!
//! - `accuracy`: Profile completeness score.
//! - `catalog`: Category table, field limits, banner copy.
//! - `config`: Configuration management.
//! - `eligibility_gate`: Positional eligibility collection rules.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers and routing.
//! - `journey`: Journey state machine and auto-advance timer.
//! - `models`: Core data models.
//! - `normalizer`: Recommendation response adapters and fallback list.
//! - `profile`: Pure profile updates.
//! - `services`: Recommendation, partner token and eligibility clients.
//! - `value_mapper`: Logarithmic slider mapping and display helpers.

pub mod accuracy;
pub mod catalog;
pub mod config;
pub mod eligibility_gate;
pub mod errors;
pub mod handlers;
pub mod journey;
pub mod models;
pub mod normalizer;
pub mod profile;
pub mod services;
pub mod value_mapper;
