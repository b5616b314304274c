pub mod connection;
pub mod lru;
pub mod server;

pub use connection::Connection;
pub use server::Server;
