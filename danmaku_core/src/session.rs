use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::Serialize;

use crate::affiliation::AffiliationResolver;
use crate::config::{ConfigError, SubtitleConfig};
use crate::host::{HostObject, HostRef, ObjectHandle};
use crate::labels::LabelTables;
use crate::overlay::{ContainerId, OverlayController, OverlayInstance, UiHost};
use crate::probe::ProbeSet;
use crate::registry::SpeakerRegistry;

/// Notifications delivered by the host integration layer, in host order.
pub enum HostEvent {
    ActorJoined(HostRef),
    ActorLeft(HostRef),
    VoiceLine { speaker: ObjectHandle, clip: String },
    ContainerAvailable(ContainerId),
    ContainerDisabled(ContainerId),
    ContainerDestroyed(ContainerId),
    SessionEnded,
}

/// Everything the renderer needs to draw one subtitle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayRequest {
    pub actor: ObjectHandle,
    pub speaker: ObjectHandle,
    pub nickname: Option<String>,
    pub role: Option<String>,
    pub role_label: String,
    pub voice_label: String,
    pub clip: String,
    pub is_friendly: bool,
    pub overlay: OverlayInstance,
}

pub trait DisplaySink {
    fn display(&self, request: &DisplayRequest);
}

#[derive(Clone, Default)]
pub struct RecordingDisplaySink {
    requests: Rc<RefCell<Vec<DisplayRequest>>>,
}

impl RecordingDisplaySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<DisplayRequest> {
        self.requests.borrow().clone()
    }
}

impl DisplaySink for RecordingDisplaySink {
    fn display(&self, request: &DisplayRequest) {
        self.requests.borrow_mut().push(request.clone());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterReason {
    OwnVoice,
    Friendly,
    Hostile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum VoiceOutcome {
    Displayed,
    Unresolved,
    Filtered(FilterReason),
    OverlayUnavailable,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub actors_indexed: u32,
    pub actors_unindexed: u32,
    pub voice_lines: u32,
    pub displayed: u32,
    pub unresolved: u32,
    pub filtered: u32,
    pub overlay_failures: u32,
    pub stale_purged: u32,
}

/// Routes host events through the speaker registry, the affiliation check
/// and the overlay controller.
pub struct SubtitleSession<U: UiHost, S: DisplaySink> {
    config: SubtitleConfig,
    probes: ProbeSet,
    registry: SpeakerRegistry,
    affiliation: AffiliationResolver,
    overlay: OverlayController,
    labels: LabelTables,
    observer: Option<Weak<dyn HostObject>>,
    ui: U,
    sink: S,
    stats: SessionStats,
}

impl<U: UiHost, S: DisplaySink> SubtitleSession<U, S> {
    pub fn new(
        config: SubtitleConfig,
        labels: LabelTables,
        ui: U,
        sink: S,
    ) -> Result<Self, ConfigError> {
        let probes = config.probe_set()?;
        Ok(Self {
            registry: SpeakerRegistry::new(probes.speaker.clone()),
            affiliation: AffiliationResolver::new(probes.affiliation.clone()),
            overlay: OverlayController::new(),
            probes,
            config,
            labels,
            observer: None,
            ui,
            sink,
            stats: SessionStats::default(),
        })
    }

    pub fn handle(&mut self, event: HostEvent) -> Option<VoiceOutcome> {
        match event {
            HostEvent::ActorJoined(actor) => self.actor_joined(&actor),
            HostEvent::ActorLeft(actor) => self.actor_left(&actor),
            HostEvent::VoiceLine { speaker, clip } => return Some(self.voice_line(speaker, &clip)),
            HostEvent::ContainerAvailable(container) => self.container_available(container),
            HostEvent::ContainerDisabled(container) => {
                self.overlay.on_container_disabled(container);
            }
            HostEvent::ContainerDestroyed(container) => {
                self.overlay.on_container_destroyed(container);
            }
            HostEvent::SessionEnded => self.end(),
        }
        None
    }

    pub fn actor_joined(&mut self, actor: &HostRef) {
        if self.probes.observer.resolve_bool(actor.as_ref()) == Some(true) {
            log::debug!("actor {} is the local observer", actor.handle());
            self.observer = Some(Rc::downgrade(actor));
        }
        match self.registry.index(actor) {
            Some(_) => self.stats.actors_indexed += 1,
            None => self.stats.actors_unindexed += 1,
        }
    }

    pub fn actor_left(&mut self, actor: &HostRef) {
        let handle = actor.handle();
        self.registry.remove(handle);
        if self.observer().map(|observer| observer.handle()) == Some(handle) {
            self.observer = None;
        }
    }

    pub fn voice_line(&mut self, speaker: ObjectHandle, clip: &str) -> VoiceOutcome {
        self.stats.voice_lines += 1;
        let interval = self.config.purge_interval;
        if interval > 0 && self.stats.voice_lines % interval == 0 {
            self.stats.stale_purged += self.registry.purge_stale() as u32;
        }

        let Some(actor) = self.registry.resolve(speaker) else {
            log::debug!("voice line `{clip}` on speaker {speaker} has no known actor");
            self.stats.unresolved += 1;
            return VoiceOutcome::Unresolved;
        };

        let observer = self.observer();
        let own_voice = observer
            .as_ref()
            .map(|observer| observer.handle() == actor.handle())
            .unwrap_or(false);
        let is_friendly = observer
            .as_ref()
            .map(|observer| self.affiliation.is_friendly(observer.as_ref(), actor.as_ref()))
            .unwrap_or(false);

        let filtered = if own_voice {
            (!self.config.show_self).then_some(FilterReason::OwnVoice)
        } else if is_friendly {
            (!self.config.show_friendly).then_some(FilterReason::Friendly)
        } else {
            (!self.config.show_hostile).then_some(FilterReason::Hostile)
        };
        if let Some(reason) = filtered {
            self.stats.filtered += 1;
            return VoiceOutcome::Filtered(reason);
        }

        let overlay = match self.overlay.get_or_create(&mut self.ui) {
            Ok(overlay) => overlay,
            Err(err) => {
                log::warn!("dropping voice line `{clip}`: {err}");
                self.stats.overlay_failures += 1;
                return VoiceOutcome::OverlayUnavailable;
            }
        };

        let role = self.probes.role.resolve_text(actor.as_ref());
        let voice = self.probes.voice.resolve_text(actor.as_ref());
        let request = DisplayRequest {
            actor: actor.handle(),
            speaker,
            nickname: self.probes.nickname.resolve_text(actor.as_ref()),
            role_label: self
                .labels
                .role_label(role.as_deref().unwrap_or_default())
                .to_string(),
            voice_label: self
                .labels
                .voice_label(voice.as_deref().unwrap_or_default())
                .to_string(),
            role,
            clip: clip.to_string(),
            is_friendly,
            overlay,
        };
        self.sink.display(&request);
        self.stats.displayed += 1;
        VoiceOutcome::Displayed
    }

    fn container_available(&mut self, container: ContainerId) {
        if let Err(err) = self.overlay.on_container_available(&mut self.ui, container) {
            log::warn!("could not move overlay onto {container}: {err}");
        }
    }

    /// Forgets every actor and tears the overlay down.
    pub fn end(&mut self) {
        self.registry.clear();
        self.observer = None;
        self.overlay.destroy(&mut self.ui);
    }

    pub fn observer(&self) -> Option<HostRef> {
        self.observer.as_ref().and_then(Weak::upgrade)
    }

    pub fn registry(&self) -> &SpeakerRegistry {
        &self.registry
    }

    pub fn overlay(&self) -> &OverlayController {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> (&mut OverlayController, &mut U) {
        (&mut self.overlay, &mut self.ui)
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut U {
        &mut self.ui
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }
}
