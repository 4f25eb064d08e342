//! Declarative browser scenario runner — library surface.
//!
//! See `SPEC_FULL.md` component numbering for how these modules line up
//! with the design: schema/expand/selector (§4.1-4.3), registry/handlers
//! (§4.4-4.5), runner (§4.6), artifacts/report (§4.7-4.8), lint (§4.9),
//! author (§4.10), browser (§4.11), config/telemetry (§4.12).

pub mod artifacts;
pub mod author;
pub mod browser;
pub mod config;
pub mod error;
pub mod expand;
pub mod handlers;
pub mod lint;
pub mod registry;
pub mod report;
pub mod runner;
pub mod schema;
pub mod selector;
pub mod telemetry;
