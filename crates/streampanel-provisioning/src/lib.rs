//! # Streampanel Provisioning Pipeline
//!
//! Background job pipeline for provisioning subscription users across Plex,
//! IPTV panels and the IPTV-Editor.
//!
//! The HTTP layer creates the user row, calls
//! [`registry::JobRegistry::create_job`] for an id it returns immediately,
//! then fires [`processor::ProvisioningProcessor::spawn`] without awaiting
//! it. The client polls job state out of the registry; the processor writes
//! every stage outcome there and nothing else escapes it.
//!
//! Not a durable queue: jobs live in process memory for a bounded retention
//! window and are purged by [`registry::spawn_cleanup_sweeper`]. A failed
//! stage stays failed; there is no retry and no cancellation.

pub mod config;
pub mod effects;
pub mod expiration;
pub mod processor;
pub mod registry;
pub mod stage;

pub use config::{IptvConfig, IptvEditorConfig, PlexConfig, ProvisioningConfig, UserData};
pub use processor::ProvisioningProcessor;
pub use registry::{Job, JobRegistry};
pub use stage::{ProvisionStage, StageState, StageStatus};
