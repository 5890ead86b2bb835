//! Lifecycle of the single subtitle overlay.
//!
//! The host can tear down its battle UI at any time, so the controller never
//! trusts a remembered container without checking it first and relies on the
//! integration layer to report container teardown through
//! [`OverlayController::on_container_destroyed`] and
//! [`OverlayController::on_container_disabled`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(pub u64);

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ui#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverlayId(pub u64);

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "overlay#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UiError {
    #[error("container {0} no longer exists")]
    ContainerGone(ContainerId),
    #[error("host refused the request: {0}")]
    Refused(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    #[error("attaching the overlay to {container} failed: {source}")]
    AttachFailed {
        container: ContainerId,
        #[source]
        source: UiError,
    },
    #[error("overlay attached to {0} but the component could not be located")]
    ComponentMissing(ContainerId),
    #[error("fallback surface could not be created: {0}")]
    FallbackUnavailable(#[source] UiError),
}

/// UI operations the host integration layer provides.
pub trait UiHost {
    fn find_battle_root(&self) -> Option<ContainerId>;

    /// Whether the container exists and is enabled.
    fn is_alive(&self, container: ContainerId) -> bool;

    fn find_overlay(&self, container: ContainerId) -> Option<OverlayId>;

    fn attach_overlay(&mut self, container: ContainerId) -> Result<(), UiError>;

    fn destroy_overlay(&mut self, overlay: OverlayId);

    /// Creates a full-screen root owned by the caller.
    fn create_fallback_root(&mut self) -> Result<ContainerId, UiError>;

    /// Must tolerate containers that are disabled or already gone.
    fn destroy_container(&mut self, container: ContainerId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    BattleUi,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayInstance {
    pub id: OverlayId,
    pub container: ContainerId,
    pub surface: Surface,
    /// Increases with every instance the controller takes ownership of.
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Absent,
    AttachedToBattleUi(OverlayInstance),
    AttachedToFallback(OverlayInstance),
}

#[derive(Debug)]
pub struct OverlayController {
    state: OverlayState,
    fallback_root: Option<ContainerId>,
    /// Owned fallback root the host disabled; still ours to destroy.
    retired_root: Option<ContainerId>,
    generation: u64,
}

impl Default for OverlayController {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayController {
    pub fn new() -> Self {
        Self {
            state: OverlayState::Absent,
            fallback_root: None,
            retired_root: None,
            generation: 0,
        }
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    pub fn current(&self) -> Option<OverlayInstance> {
        match self.state {
            OverlayState::Absent => None,
            OverlayState::AttachedToBattleUi(instance)
            | OverlayState::AttachedToFallback(instance) => Some(instance),
        }
    }

    pub fn fallback_root(&self) -> Option<ContainerId> {
        self.fallback_root
    }

    /// Returns the live overlay, creating and attaching one when none exists.
    /// An owned fallback root is reused while it is alive and destroyed
    /// before any replacement is created.
    pub fn get_or_create(&mut self, ui: &mut dyn UiHost) -> Result<OverlayInstance, OverlayError> {
        if let Some(instance) = self.current() {
            if ui.is_alive(instance.container) && ui.find_overlay(instance.container) == Some(instance.id)
            {
                return Ok(instance);
            }
            log::debug!(
                "{} lost its container {}; recreating",
                instance.id,
                instance.container
            );
            self.state = OverlayState::Absent;
        }

        if let Some(root) = ui.find_battle_root().filter(|root| ui.is_alive(*root)) {
            match self.adopt_or_attach(ui, root, Surface::BattleUi) {
                Ok(instance) => {
                    self.release_fallback(ui);
                    return Ok(instance);
                }
                Err(OverlayError::AttachFailed {
                    source: UiError::ContainerGone(_),
                    ..
                }) => {
                    log::debug!("battle UI {root} vanished during attach; using fallback surface");
                }
                Err(err) => return Err(err),
            }
        }

        let root = match self.fallback_root.filter(|root| ui.is_alive(*root)) {
            Some(root) => {
                self.release_retired(ui);
                root
            }
            None => {
                self.release_fallback(ui);
                let root = ui
                    .create_fallback_root()
                    .map_err(OverlayError::FallbackUnavailable)?;
                log::debug!("created fallback surface {root}");
                self.fallback_root = Some(root);
                root
            }
        };
        self.adopt_or_attach(ui, root, Surface::Fallback)
    }

    /// Tears down the current overlay and any fallback surface the
    /// controller owns. Does nothing when the controller holds neither.
    pub fn destroy(&mut self, ui: &mut dyn UiHost) {
        self.detach(ui);
        self.release_fallback(ui);
    }

    /// Replaces whatever overlay exists with one on `container`. Targeting
    /// the owned fallback root keeps the fallback surface. A container that
    /// is already gone, before or during the attach, counts as no container
    /// at all.
    pub fn attach_to(
        &mut self,
        ui: &mut dyn UiHost,
        container: ContainerId,
    ) -> Result<OverlayInstance, OverlayError> {
        if !ui.is_alive(container) {
            log::debug!("attach target {container} is gone; keeping or creating a fallback");
            return self.get_or_create(ui);
        }
        if let Some(instance) = self.current() {
            if instance.container == container && ui.find_overlay(container) == Some(instance.id) {
                return Ok(instance);
            }
        }

        let surface = if self.fallback_root == Some(container) {
            Surface::Fallback
        } else {
            Surface::BattleUi
        };
        self.detach(ui);
        if surface == Surface::BattleUi {
            self.release_fallback(ui);
        }
        match self.adopt_or_attach(ui, container, surface) {
            Err(OverlayError::AttachFailed {
                source: UiError::ContainerGone(_),
                ..
            }) => {
                log::debug!("attach target {container} vanished during attach");
                self.get_or_create(ui)
            }
            result => result,
        }
    }

    /// Moves a fallback-hosted overlay onto a newly available container.
    pub fn on_container_available(
        &mut self,
        ui: &mut dyn UiHost,
        container: ContainerId,
    ) -> Result<Option<OverlayInstance>, OverlayError> {
        match self.state {
            OverlayState::AttachedToFallback(_) => self.attach_to(ui, container).map(Some),
            _ => Ok(None),
        }
    }

    /// Returns whether the controller was holding the container.
    pub fn on_container_destroyed(&mut self, container: ContainerId) -> bool {
        let mut held = self.drop_instance_on(container);
        if self.fallback_root == Some(container) {
            self.fallback_root = None;
            held = true;
        }
        if self.retired_root == Some(container) {
            self.retired_root = None;
            held = true;
        }
        if held {
            log::debug!("dropped reference to destroyed container {container}");
        }
        held
    }

    /// A disabled fallback root still exists, so it moves to the retired
    /// slot and is destroyed before a replacement is created.
    pub fn on_container_disabled(&mut self, container: ContainerId) -> bool {
        let mut held = self.drop_instance_on(container);
        if self.fallback_root == Some(container) {
            self.retired_root = self.fallback_root.take();
            held = true;
        }
        if held {
            log::debug!("dropped reference to disabled container {container}");
        }
        held
    }

    fn drop_instance_on(&mut self, container: ContainerId) -> bool {
        if self.current().map(|instance| instance.container) == Some(container) {
            self.state = OverlayState::Absent;
            return true;
        }
        false
    }

    fn detach(&mut self, ui: &mut dyn UiHost) {
        if let Some(instance) = self.current() {
            if ui.is_alive(instance.container) {
                ui.destroy_overlay(instance.id);
            }
            log::debug!("destroyed {} on {}", instance.id, instance.container);
        }
        self.state = OverlayState::Absent;
    }

    fn release_fallback(&mut self, ui: &mut dyn UiHost) {
        if let Some(root) = self.fallback_root.take() {
            release_root(ui, root);
        }
        self.release_retired(ui);
    }

    fn release_retired(&mut self, ui: &mut dyn UiHost) {
        if let Some(root) = self.retired_root.take() {
            release_root(ui, root);
        }
    }

    fn adopt_or_attach(
        &mut self,
        ui: &mut dyn UiHost,
        container: ContainerId,
        surface: Surface,
    ) -> Result<OverlayInstance, OverlayError> {
        match ui.find_overlay(container) {
            Some(existing) => {
                log::debug!("adopting {existing} already attached to {container}");
                Ok(self.install(existing, container, surface))
            }
            None => self.attach_fresh(ui, container, surface),
        }
    }

    fn attach_fresh(
        &mut self,
        ui: &mut dyn UiHost,
        container: ContainerId,
        surface: Surface,
    ) -> Result<OverlayInstance, OverlayError> {
        ui.attach_overlay(container)
            .map_err(|source| OverlayError::AttachFailed { container, source })?;
        let id = ui
            .find_overlay(container)
            .ok_or(OverlayError::ComponentMissing(container))?;
        Ok(self.install(id, container, surface))
    }

    fn install(&mut self, id: OverlayId, container: ContainerId, surface: Surface) -> OverlayInstance {
        self.generation += 1;
        let instance = OverlayInstance {
            id,
            container,
            surface,
            generation: self.generation,
        };
        self.state = match surface {
            Surface::BattleUi => OverlayState::AttachedToBattleUi(instance),
            Surface::Fallback => OverlayState::AttachedToFallback(instance),
        };
        log::debug!("{id} attached to {container} ({surface:?})");
        instance
    }
}

fn release_root(ui: &mut dyn UiHost, root: ContainerId) {
    if let Some(stray) = ui.find_overlay(root) {
        ui.destroy_overlay(stray);
    }
    ui.destroy_container(root);
    log::debug!("released fallback surface {root}");
}
