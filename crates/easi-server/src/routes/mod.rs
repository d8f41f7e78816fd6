pub mod actions;
pub mod config;
pub mod events;
pub mod feedback;
pub mod intakes;
