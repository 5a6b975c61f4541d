//! Leaf Disease Finder: upload a leaf photo, get a plant-disease diagnosis
//! from Google Gemini, rendered as a card.

pub mod config;
pub mod diagnosis;
pub mod error;
pub mod intake;
pub mod render;
pub mod routes;
pub mod state;
