//! Lanekeeper - lane discipline for parallel agents sharing one repository
//!
//! Per-issue locks stop two sessions from working the same issue; the squash
//! and merge protocols fold each task branch into its integration branch as a
//! single fast-forwarded commit.

pub mod config;
pub mod existing_work;
pub mod git;
pub mod locks;
pub mod logging;
pub mod merge;
pub mod report;
pub mod squash;
