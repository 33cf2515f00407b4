//! # Crawl Ledger
//!
//! Bookkeeping for batch processing of a partitioned web-crawl corpus.
//!
//! Crawl Ledger keeps a catalog of the segments each crawl release is split
//! into, plans parse and combine jobs over them, and records which segments
//! have been handed to a batch runner so that work is never planned twice.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Partition  │──▶│  Dataset    │──▶│   SQLite     │
//! │  lister     │   │  index      │   │  catalog +   │
//! └─────────────┘   └─────────────┘   │  job ledger  │
//!                                     └──────┬───────┘
//!                        ┌───────────────────┤
//!                        ▼                   ▼
//!                 ┌─────────────┐     ┌─────────────┐   ┌──────────┐
//!                 │   Step      │     │    Run      │──▶│  Batch   │
//!                 │   planner   │     │ coordinator │   │  runner  │
//!                 └─────────────┘     └─────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! crawl-ledger init
//! crawl-ledger discover CC-MAIN-2014-49
//! crawl-ledger plan parse CC-MAIN-2014-49 --max-segments 2 --max-files 3
//! crawl-ledger submit 1389789645620
//! crawl-ledger plan combine 1389789645620 1389789645621
//! crawl-ledger status
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`clock`] | Injectable time and job naming |
//! | [`traits`] | Lister, runner and cluster-shape seams |
//! | [`segments`] | Segment catalog queries |
//! | [`index`] | Segment discovery |
//! | [`planner`] | Parse and combine job planning |
//! | [`ledger`] | Job and step records |
//! | [`cluster`] | Cluster shape |
//! | [`flow`] | Launch request compilation |
//! | [`coordinator`] | Job submission |
//! | [`status`] | Release status and job history |
//! | [`lister_manifest`] | Manifest-file partition lister |
//! | [`runner_command`] | External-command batch runner |
//! | [`commands`] | CLI command handlers |
//! | [`logging`] | Subscriber setup |

pub mod clock;
pub mod cluster;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod flow;
pub mod index;
pub mod ledger;
pub mod lister_manifest;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod planner;
pub mod runner_command;
pub mod segments;
pub mod status;
pub mod traits;
