use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::host::{HostObject, HostRef, ObjectHandle};
use crate::probe::ProbeChain;

struct RegistryEntry {
    speaker: Weak<dyn HostObject>,
    actor: Weak<dyn HostObject>,
    actor_handle: ObjectHandle,
}

/// Maps speaker handles back to the actors that own them.
///
/// Entries hold weak references only; the host world owns every actor and
/// speaker. Each speaker handle has at most one entry and each actor at most
/// one speaker handle at a time.
pub struct SpeakerRegistry {
    chain: ProbeChain,
    entries: HashMap<ObjectHandle, RegistryEntry>,
}

impl SpeakerRegistry {
    pub fn new(chain: ProbeChain) -> Self {
        Self {
            chain,
            entries: HashMap::new(),
        }
    }

    /// Locates the actor's speaker and records it. Returns the speaker handle,
    /// or `None` when no probe found one; the actor then stays unindexed.
    pub fn index(&mut self, actor: &HostRef) -> Option<ObjectHandle> {
        let actor_handle = actor.handle();
        let Some(hit) = self.chain.resolve(actor.as_ref()) else {
            log::debug!("actor {actor_handle} has no resolvable speaker");
            return None;
        };
        let speaker = hit.value.as_object()?.clone();
        let speaker_handle = speaker.handle();

        let replaced = self.remove(actor_handle);
        if replaced > 0 {
            log::debug!("actor {actor_handle} re-indexed; dropped {replaced} previous speaker entry");
        }
        if let Some(previous) = self.entries.get(&speaker_handle) {
            log::debug!(
                "speaker {speaker_handle} moves from actor {} to {actor_handle}",
                previous.actor_handle
            );
        }

        self.entries.insert(
            speaker_handle,
            RegistryEntry {
                speaker: Rc::downgrade(&speaker),
                actor: Rc::downgrade(actor),
                actor_handle,
            },
        );
        log::debug!(
            "indexed speaker {speaker_handle} -> actor {actor_handle} via `{}`",
            hit.member
        );
        Some(speaker_handle)
    }

    /// Drops every entry that targets `actor`. Returns how many were removed.
    pub fn remove(&mut self, actor: ObjectHandle) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.actor_handle != actor);
        before - self.entries.len()
    }

    /// Exact-identity lookup. Entries whose speaker or actor has been
    /// released by the host resolve to `None`.
    pub fn resolve(&self, speaker: ObjectHandle) -> Option<HostRef> {
        let entry = self.entries.get(&speaker)?;
        if entry.speaker.strong_count() == 0 {
            log::debug!("speaker {speaker} was released by the host");
            return None;
        }
        let actor = entry.actor.upgrade();
        if actor.is_none() {
            log::debug!(
                "speaker {speaker} points at departed actor {}",
                entry.actor_handle
            );
        }
        actor
    }

    pub fn speaker_for(&self, actor: ObjectHandle) -> Option<ObjectHandle> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.actor_handle == actor)
            .map(|(speaker, _)| *speaker)
    }

    /// Drops entries whose speaker or actor no longer exists.
    pub fn purge_stale(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.speaker.strong_count() > 0 && entry.actor.strong_count() > 0);
        let purged = before - self.entries.len();
        if purged > 0 {
            log::debug!("purged {purged} stale speaker entries");
        }
        purged
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(speaker, actor)` pairs ordered by speaker handle.
    pub fn pairs(&self) -> Vec<(ObjectHandle, ObjectHandle)> {
        let mut pairs: Vec<_> = self
            .entries
            .iter()
            .map(|(speaker, entry)| (*speaker, entry.actor_handle))
            .collect();
        pairs.sort();
        pairs
    }
}
