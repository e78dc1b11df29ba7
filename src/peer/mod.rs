pub mod choke;
pub mod connection;
pub mod connection_manager;
pub mod stats;
pub mod swarm;
pub mod sweeper;
