pub mod memory;
pub mod postgres;
pub mod store;

pub use store::{RunStore, TicketStore};
