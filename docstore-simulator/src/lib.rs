// Docstore Simulator Library

pub mod generator;
pub mod input;
pub mod models;
pub mod runner;
pub mod stats;
