pub mod client;
pub mod models;
pub mod population;

pub use client::InventoryClient;
pub use models::{CityListing, Destination, DestinationType, InventoryTour, TourPage};
