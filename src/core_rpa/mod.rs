pub mod rpa;

pub use rpa::{lease_to_socket, PortBroker, RpaError};
