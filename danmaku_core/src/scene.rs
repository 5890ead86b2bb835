use std::collections::BTreeMap;

use serde::Serialize;

use crate::overlay::{ContainerId, OverlayId, UiError, UiHost};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    BattleUi,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SceneOp {
    ContainerOpened {
        container: ContainerId,
        kind: ContainerKind,
    },
    ContainerDisabled {
        container: ContainerId,
    },
    ContainerClosed {
        container: ContainerId,
    },
    OverlayAttached {
        overlay: OverlayId,
        container: ContainerId,
    },
    OverlayDestroyed {
        overlay: OverlayId,
    },
}

#[derive(Debug)]
struct ContainerNode {
    kind: ContainerKind,
    enabled: bool,
    overlay: Option<OverlayId>,
}

/// In-memory UI tree standing in for the host's interface layer. Every
/// mutation is appended to an operation log.
#[derive(Debug, Default)]
pub struct SceneGraph {
    containers: BTreeMap<ContainerId, ContainerNode>,
    battle_root: Option<ContainerId>,
    next_id: u64,
    ops: Vec<SceneOp>,
    refuse_attach: bool,
    hide_attached: bool,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens (or reopens) the host battle UI under a host-chosen id.
    pub fn open_battle_ui(&mut self, container: ContainerId) -> ContainerId {
        if self.containers.contains_key(&container) {
            self.close_container(container);
        }
        self.containers.insert(
            container,
            ContainerNode {
                kind: ContainerKind::BattleUi,
                enabled: true,
                overlay: None,
            },
        );
        self.battle_root = Some(container);
        self.ops.push(SceneOp::ContainerOpened {
            container,
            kind: ContainerKind::BattleUi,
        });
        container
    }

    pub fn disable_container(&mut self, container: ContainerId) {
        if let Some(node) = self.containers.get_mut(&container) {
            node.enabled = false;
            self.ops.push(SceneOp::ContainerDisabled { container });
        }
    }

    /// Removes a container together with any overlay attached to it.
    pub fn close_container(&mut self, container: ContainerId) {
        let Some(node) = self.containers.remove(&container) else {
            return;
        };
        if let Some(overlay) = node.overlay {
            self.ops.push(SceneOp::OverlayDestroyed { overlay });
        }
        if self.battle_root == Some(container) {
            self.battle_root = None;
        }
        self.ops.push(SceneOp::ContainerClosed { container });
    }

    /// Live overlays across all enabled containers.
    pub fn overlay_count(&self) -> usize {
        self.containers
            .values()
            .filter(|node| node.enabled && node.overlay.is_some())
            .count()
    }

    /// Containers of `kind` that still exist, enabled or not.
    pub fn containers_of(&self, kind: ContainerKind) -> Vec<ContainerId> {
        self.containers
            .iter()
            .filter(|(_, node)| node.kind == kind)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn ops(&self) -> &[SceneOp] {
        &self.ops
    }

    pub fn refuse_attachments(&mut self, refuse: bool) {
        self.refuse_attach = refuse;
    }

    /// Makes attached overlays invisible to `find_overlay`.
    pub fn hide_attached_overlays(&mut self, hide: bool) {
        self.hide_attached = hide;
    }

    fn allocate(&mut self) -> u64 {
        loop {
            self.next_id += 1;
            if !self.containers.contains_key(&ContainerId(self.next_id)) {
                return self.next_id;
            }
        }
    }
}

impl UiHost for SceneGraph {
    fn find_battle_root(&self) -> Option<ContainerId> {
        self.battle_root
    }

    fn is_alive(&self, container: ContainerId) -> bool {
        self.containers
            .get(&container)
            .map(|node| node.enabled)
            .unwrap_or(false)
    }

    fn find_overlay(&self, container: ContainerId) -> Option<OverlayId> {
        if self.hide_attached {
            return None;
        }
        self.containers
            .get(&container)
            .filter(|node| node.enabled)
            .and_then(|node| node.overlay)
    }

    fn attach_overlay(&mut self, container: ContainerId) -> Result<(), UiError> {
        if self.refuse_attach {
            return Err(UiError::Refused("attachments disabled".to_string()));
        }
        if !self.is_alive(container) {
            return Err(UiError::ContainerGone(container));
        }
        let overlay = OverlayId(self.allocate());
        let Some(node) = self.containers.get_mut(&container) else {
            return Err(UiError::ContainerGone(container));
        };
        if node.overlay.is_some() {
            return Err(UiError::Refused(format!("{container} already hosts an overlay")));
        }
        node.overlay = Some(overlay);
        self.ops.push(SceneOp::OverlayAttached { overlay, container });
        Ok(())
    }

    fn destroy_overlay(&mut self, overlay: OverlayId) {
        let Some(node) = self
            .containers
            .values_mut()
            .find(|node| node.overlay == Some(overlay))
        else {
            return;
        };
        node.overlay = None;
        self.ops.push(SceneOp::OverlayDestroyed { overlay });
    }

    fn create_fallback_root(&mut self) -> Result<ContainerId, UiError> {
        let container = ContainerId(self.allocate());
        self.containers.insert(
            container,
            ContainerNode {
                kind: ContainerKind::Fallback,
                enabled: true,
                overlay: None,
            },
        );
        self.ops.push(SceneOp::ContainerOpened {
            container,
            kind: ContainerKind::Fallback,
        });
        Ok(container)
    }

    fn destroy_container(&mut self, container: ContainerId) {
        self.close_container(container);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closing_a_container_takes_its_overlay_along() {
        let mut scene = SceneGraph::new();
        let battle = scene.open_battle_ui(ContainerId(1));
        scene.attach_overlay(battle).unwrap();
        let overlay = scene.find_overlay(battle).unwrap();

        scene.close_container(battle);
        assert_eq!(scene.find_battle_root(), None);
        assert_eq!(scene.overlay_count(), 0);
        assert_eq!(
            scene.ops(),
            &[
                SceneOp::ContainerOpened {
                    container: battle,
                    kind: ContainerKind::BattleUi
                },
                SceneOp::OverlayAttached {
                    overlay,
                    container: battle
                },
                SceneOp::OverlayDestroyed { overlay },
                SceneOp::ContainerClosed { container: battle },
            ]
        );
    }

    #[test]
    fn allocated_ids_skip_host_containers() {
        let mut scene = SceneGraph::new();
        scene.open_battle_ui(ContainerId(1));
        let fallback = scene.create_fallback_root().unwrap();
        assert_ne!(fallback, ContainerId(1));
    }

    #[test]
    fn disabled_containers_still_count_until_closed() {
        let mut scene = SceneGraph::new();
        let fallback = scene.create_fallback_root().unwrap();
        scene.disable_container(fallback);
        assert!(!scene.is_alive(fallback));
        assert_eq!(scene.containers_of(ContainerKind::Fallback), vec![fallback]);

        scene.destroy_container(fallback);
        assert!(scene.containers_of(ContainerKind::Fallback).is_empty());
    }

    #[test]
    fn one_overlay_per_container() {
        let mut scene = SceneGraph::new();
        let battle = scene.open_battle_ui(ContainerId(1));
        scene.attach_overlay(battle).unwrap();
        assert!(matches!(
            scene.attach_overlay(battle),
            Err(UiError::Refused(_))
        ));
        scene.disable_container(battle);
        assert_eq!(
            scene.attach_overlay(battle),
            Err(UiError::ContainerGone(battle))
        );
    }
}
