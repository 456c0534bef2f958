pub mod connection;
pub mod endpoints;

pub use connection::{ApiClient, ApiConnectionError, ServerMessage};
pub use endpoints::{Editable, Ingredients, Meals, Recipes, Resource};
