pub mod cli;
pub mod client;
pub mod gateway;
pub mod io;
pub mod model;
pub mod ops;
pub mod session;
pub mod store;

pub use client::Client;
