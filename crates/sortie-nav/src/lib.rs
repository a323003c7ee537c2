pub mod doctor;
pub mod geo;
pub mod route;

pub use geo::GeoPoint;
