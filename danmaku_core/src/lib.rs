//! Speaker identity and overlay lifecycle for in-game speech subtitles.
//!
//! The host process owns every actor, speaker and UI object and may destroy
//! or recreate any of them between two events. This crate keeps the two
//! pieces of state that must stay correct regardless: which actor a speaker
//! handle belongs to, and which single overlay instance is currently live.

pub mod affiliation;
pub mod config;
pub mod host;
pub mod labels;
pub mod overlay;
pub mod probe;
pub mod registry;
pub mod scene;
pub mod session;

pub use affiliation::AffiliationResolver;
pub use config::{ConfigError, SubtitleConfig};
pub use host::{HostObject, HostRef, HostValue, ObjectHandle, ObjectSpec, SnapshotObject};
pub use labels::{LabelTable, LabelTables};
pub use overlay::{
    ContainerId, OverlayController, OverlayError, OverlayId, OverlayInstance, OverlayState,
    Surface, UiError, UiHost,
};
pub use probe::{ProbeChain, ProbeConfig, ProbeSet};
pub use registry::SpeakerRegistry;
pub use scene::SceneGraph;
pub use session::{
    DisplayRequest, DisplaySink, HostEvent, RecordingDisplaySink, SessionStats, SubtitleSession,
    VoiceOutcome,
};
