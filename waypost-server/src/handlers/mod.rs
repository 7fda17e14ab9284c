pub mod carriers;
pub mod health;
pub mod live;
pub mod signals;
pub mod stops;
pub mod trips;
