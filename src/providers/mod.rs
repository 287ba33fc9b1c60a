//! Packet source implementations

pub mod udp;

pub use udp::UdpSource;
