pub mod config;
pub mod rest;
pub mod service;
pub mod telemetry;
