pub mod routes;
pub mod server;
pub mod state;

pub use server::{build_router, run};
pub use state::AppState;
