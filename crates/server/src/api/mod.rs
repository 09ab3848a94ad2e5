pub mod handlers;
pub mod routes;
pub mod tasks;

pub use routes::create_router;
