pub mod seed;
pub mod store;
pub mod transport;

pub use store::ChatStore;
pub use transport::{Flaky, NoDelay, SimulatedLatency, Transport};
