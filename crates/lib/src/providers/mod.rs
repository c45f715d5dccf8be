//! # Providers
//!
//! Seams to the two external collaborators: the completion service (`ai`) and the
//! warehouse that describes, samples and executes (`db`).

pub mod ai;
pub mod db;
pub mod factory;
