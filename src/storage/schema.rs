//! Rows exchanged with the storage backend
//!
//! ## Ownership of pod columns
//!
//! A pod row is created by an administrator. The collector only reads the
//! administrative columns (monitor string, creation date, score) and owns
//! everything in [`PodRecord`]: each pass rewrites all of it with the best
//! values it found, `None` included. `hidden`, the monitor string and the
//! creation date are never written by the collector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{LiveState, ResponseTime};

/// The part of a pod row the collector needs to start a pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodSummary {
    pub domain: String,
    /// Legacy dashboard URL or uptime API key
    pub pingdom_url: Option<String>,
    pub score: i32,
    pub date_created: Option<DateTime<Utc>>,
    pub admin_rating: f64,
}

/// A rating left by a user or an administrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub domain: String,
    pub is_admin: bool,
    pub rating: f64,
}

/// Everything the collector writes back for one pod
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodRecord {
    pub domain: String,

    // === Protocol metadata ===
    pub git_date: Option<String>,
    pub git_revision: Option<String>,
    pub encoding: Option<String>,
    pub runtime: Option<String>,
    pub server: Option<String>,
    pub short_version: Option<String>,
    pub long_version: Option<String>,
    pub master_version: Option<String>,
    /// The HTTPS probe returned a usable response
    pub secure: bool,

    // === Self-reported statistics ===
    pub registrations_open: Option<bool>,
    pub pod_name: Option<String>,
    pub total_users: Option<i64>,
    pub active_users_halfyear: Option<i64>,
    pub active_users_monthly: Option<i64>,
    pub local_posts: Option<i64>,

    // === Network and location ===
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub whois: Option<String>,

    // === Uptime monitor ===
    pub uptime_percent: Option<f64>,
    pub months_monitored: Option<i64>,
    pub response_time: Option<ResponseTime>,
    pub live_state: Option<LiveState>,

    // === Derived ===
    pub score: i32,
    pub admin_rating: f64,
    pub user_rating: f64,

    pub date_last_stats: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

impl PodRecord {
    /// A record with nothing collected yet
    pub fn empty(domain: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            domain: domain.into(),
            git_date: None,
            git_revision: None,
            encoding: None,
            runtime: None,
            server: None,
            short_version: None,
            long_version: None,
            master_version: None,
            secure: false,
            registrations_open: None,
            pod_name: None,
            total_users: None,
            active_users_halfyear: None,
            active_users_monthly: None,
            local_posts: None,
            ipv4: None,
            ipv6: None,
            country: None,
            city: None,
            region: None,
            latitude: None,
            longitude: None,
            whois: None,
            uptime_percent: None,
            months_monitored: None,
            response_time: None,
            live_state: None,
            score: 0,
            admin_rating: 0.0,
            user_rating: 0.0,
            date_last_stats: now,
            date_updated: now,
        }
    }
}

/// A pod row as created by the administrative path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPod {
    pub domain: String,
    pub pingdom_url: Option<String>,
    pub score: i32,
    pub date_created: Option<DateTime<Utc>>,
    pub hidden: bool,
}

/// A full pod row: administrative columns plus the last collected record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodRow {
    pub pingdom_url: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
    pub hidden: bool,
    /// `None` until the pod has been collected once
    pub record: Option<PodRecord>,
    pub score: i32,
}
