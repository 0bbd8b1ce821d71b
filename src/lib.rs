pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod event;
pub mod live;
pub mod output;
pub mod projector;
pub mod single_flight;
pub mod store;
pub mod sync;
pub mod worker;
