/// aquamon_service: water quality monitoring backend.
///
/// A LoRaWAN probe reports temperature, pH, turbidity, conductivity and TDS
/// through The Things Network. This crate ingests those uplinks, stores
/// them, classifies them into safety tiers and decides which reading the
/// dashboard should show.

pub mod config;
pub mod ingest;
pub mod label;
pub mod logging;
pub mod model;
pub mod quality;
pub mod resolve;
pub mod server;
pub mod store;
pub mod verify;
pub mod view;
