use std::collections::{BTreeMap, BTreeSet};
use std::{fs, path::Path, rc::Rc};

use anyhow::{Context, Result};
use danmaku_core::{ContainerId, HostObject, HostRef, ObjectHandle, ObjectSpec, SnapshotObject};
use serde::Deserialize;
use thiserror::Error;

/// A recorded host session: the actors that exist in the world and the
/// events the host fired, in order.
#[derive(Debug, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub objects: Vec<ObjectSpec>,
    pub events: Vec<ScriptEvent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptEvent {
    ActorJoined {
        actor: ObjectHandle,
    },
    ActorLeft {
        actor: ObjectHandle,
    },
    /// The host swapped an actor's speaker object without telling anyone.
    SpeakerRecreated {
        actor: ObjectHandle,
        member: String,
        speaker: ObjectSpec,
    },
    VoiceLine {
        speaker: ObjectHandle,
        clip: String,
    },
    BattleUiOpened {
        container: ContainerId,
    },
    BattleUiDisabled {
        container: ContainerId,
    },
    BattleUiClosed {
        container: ContainerId,
    },
    /// Explicit request to move the overlay onto a container.
    AttachOverlay {
        container: ContainerId,
    },
    SessionEnded,
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("event {index}: actor {handle} is not in the world")]
    UnknownActor { index: usize, handle: ObjectHandle },
    #[error("object handle {0} is declared more than once")]
    DuplicateHandle(ObjectHandle),
}

impl Script {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read script: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse script json: {}", path.display()))
    }
}

/// Top-level host objects still present in the world. Dropping an actor
/// from here releases it, the same way the host would.
pub struct World {
    actors: BTreeMap<ObjectHandle, Rc<SnapshotObject>>,
}

impl World {
    pub fn from_specs(specs: &[ObjectSpec]) -> Result<Self, ScriptError> {
        let mut seen = BTreeSet::new();
        let mut actors = BTreeMap::new();
        for spec in specs {
            let actor = SnapshotObject::build(spec);
            let mut duplicate = None;
            SnapshotObject::walk(&actor, &mut |object| {
                if !seen.insert(object.handle()) && duplicate.is_none() {
                    duplicate = Some(object.handle());
                }
            });
            if let Some(handle) = duplicate {
                return Err(ScriptError::DuplicateHandle(handle));
            }
            actors.insert(spec.handle, actor);
        }
        Ok(Self { actors })
    }

    pub fn actor(&self, index: usize, handle: ObjectHandle) -> Result<HostRef, ScriptError> {
        self.actors
            .get(&handle)
            .map(|actor| actor.clone() as HostRef)
            .ok_or(ScriptError::UnknownActor { index, handle })
    }

    pub fn snapshot(
        &self,
        index: usize,
        handle: ObjectHandle,
    ) -> Result<&Rc<SnapshotObject>, ScriptError> {
        self.actors
            .get(&handle)
            .ok_or(ScriptError::UnknownActor { index, handle })
    }

    pub fn release(&mut self, handle: ObjectHandle) -> Option<Rc<SnapshotObject>> {
        self.actors.remove(&handle)
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn script_events_parse_from_tagged_json() {
        let script: Script = serde_json::from_value(json!({
            "objects": [{ "handle": 1, "type_name": "Player" }],
            "events": [
                { "kind": "actor_joined", "actor": 1 },
                { "kind": "voice_line", "speaker": 101, "clip": "OnFight" },
                { "kind": "speaker_recreated", "actor": 1, "member": "Speaker",
                  "speaker": { "handle": 102, "type_name": "PhraseSpeaker" } },
                { "kind": "battle_ui_opened", "container": 500 },
                { "kind": "session_ended" }
            ]
        }))
        .unwrap();

        assert_eq!(script.objects.len(), 1);
        assert!(matches!(
            script.events[1],
            ScriptEvent::VoiceLine { speaker: ObjectHandle(101), .. }
        ));
        assert!(matches!(script.events[4], ScriptEvent::SessionEnded));
    }

    #[test]
    fn duplicate_handles_are_rejected() {
        let specs: Vec<ObjectSpec> = serde_json::from_value(json!([
            { "handle": 1, "type_name": "Player", "members": [
                { "name": "Speaker", "value": { "handle": 5, "type_name": "PhraseSpeaker" } }
            ] },
            { "handle": 5, "type_name": "Player" }
        ]))
        .unwrap();

        assert!(matches!(
            World::from_specs(&specs),
            Err(ScriptError::DuplicateHandle(ObjectHandle(5)))
        ));
    }

    #[test]
    fn released_actor_is_no_longer_found() {
        let specs: Vec<ObjectSpec> =
            serde_json::from_value(json!([{ "handle": 1, "type_name": "Player" }])).unwrap();
        let mut world = World::from_specs(&specs).unwrap();
        assert!(world.actor(0, ObjectHandle(1)).is_ok());
        assert!(world.release(ObjectHandle(1)).is_some());
        assert!(matches!(
            world.actor(3, ObjectHandle(1)),
            Err(ScriptError::UnknownActor { index: 3, .. })
        ));
        assert_eq!(world.len(), 0);
    }
}
