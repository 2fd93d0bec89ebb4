//! Upgrade of customized configuration files across software releases.
//!
//! The stock files of two releases are diffed with `cfgdiff-core` and the
//! resulting edit operations are replayed onto the locally customized copies,
//! so that vendor changes land without losing local edits.
//!
//! # Modules
//!
//! - [`manifest`]: TOML list of managed files and their formats
//! - [`upgrade`]: single, chained and batch upgrades
//! - [`verify`]: release-to-release diff/patch verification
//! - [`backup`]: file and directory backup and restore
//! - [`report`]: terminal-friendly colored output
//!
//! # Examples
//!
//! ```ignore
//! use cfg_upgrade::upgrade::upgrade;
//! use cfgdiff_core::{Config, ConflictPolicy, Format, PatchMode};
//!
//! let mut old = Config::new(Format::OneConf, "5.4/oned.conf");
//! let mut new = Config::new(Format::OneConf, "5.8/oned.conf");
//! let mut mine = Config::new(Format::OneConf, "/etc/one/oned.conf");
//! for config in [&mut old, &mut new, &mut mine] {
//!     config.load()?;
//! }
//!
//! let report = upgrade(&mut mine, &old, &new, &ConflictPolicy::new().with(PatchMode::Skip))?;
//! for skipped in report.skipped() {
//!     println!("kept local value at {}", skipped.path);
//! }
//! mine.save()?;
//! ```

pub mod backup;
pub mod manifest;
pub mod report;
pub mod upgrade;
pub mod verify;
