//! RefStack - analytics core for a referral-link manager
//!
//! This library implements the analytics subsystem behind RefStack's
//! referral cards: click recording, typed activity logging, time-bucketed
//! aggregation with a TTL cache, CSV/JSON export, a realtime click feed
//! and the free-tier link quota.
//!
//! # Architecture
//! - `storage`: `ReferralStore` trait with SeaORM and in-memory backends
//! - `analytics`: aggregation types and the single-pass reducer
//! - `cache`: TTL aggregation cache with an injected clock
//! - `services`: click recorder, activity logger, aggregation, export, quota
//! - `realtime`: click change-feed subscription bridge
//! - `system`: logging setup and the outbound notification queue
//! - `config`: environment-driven configuration

pub mod analytics;
pub mod cache;
pub mod config;
pub mod errors;
pub mod realtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
