//! Reflective view of objects owned by the game process.
//!
//! The core never learns the host's concrete types. Actors, speakers and
//! their nested profile structures are all reached through [`HostObject`],
//! which lists members in declaration order and reads them by name.
//! [`SnapshotObject`] is an in-memory implementation built from JSON so the
//! replay driver and the tests can stand in for a live process.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity token the host assigns to every object. Equality is identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectHandle(pub u64);

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    #[default]
    Field,
    Property,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDescriptor {
    pub name: String,
    pub type_name: String,
    pub kind: MemberKind,
    pub readable: bool,
}

pub type HostRef = Rc<dyn HostObject>;

#[derive(Clone)]
pub enum HostValue {
    Null,
    Bool(bool),
    Text(String),
    Object(HostRef),
}

impl HostValue {
    pub fn as_object(&self) -> Option<&HostRef> {
        match self {
            HostValue::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            HostValue::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => f.write_str("Null"),
            HostValue::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            HostValue::Text(text) => f.debug_tuple("Text").field(text).finish(),
            HostValue::Object(object) => {
                write!(f, "Object({} {})", object.type_name(), object.handle())
            }
        }
    }
}

/// Failure raised by the host while reading a member.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("member `{0}` does not exist")]
    Missing(String),
    #[error("member `{0}` is not readable")]
    Unreadable(String),
    #[error("reading `{member}` faulted: {reason}")]
    Faulted { member: String, reason: String },
}

pub trait HostObject {
    fn handle(&self) -> ObjectHandle;

    fn type_name(&self) -> &str;

    /// Members in declaration order, readable or not.
    fn members(&self) -> Vec<MemberDescriptor>;

    fn read(&self, member: &str) -> Result<HostValue, ReadError>;

    /// Whether the object exposes an invocable method with this name.
    fn responds_to(&self, method: &str) -> bool;
}

/// Serialized description of a host object tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub handle: ObjectHandle,
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<MemberSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub kind: MemberKind,
    #[serde(default = "default_readable")]
    pub readable: bool,
    #[serde(default)]
    pub value: ValueSpec,
}

fn default_readable() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueSpec {
    #[default]
    Null,
    Bool(bool),
    Text(String),
    Fault { fault: String },
    Object(Box<ObjectSpec>),
}

enum SnapshotValue {
    Null,
    Bool(bool),
    Text(String),
    Object(Rc<SnapshotObject>),
    Fault(String),
}

impl SnapshotValue {
    fn implied_type_name(&self) -> String {
        match self {
            SnapshotValue::Null | SnapshotValue::Fault(_) => "Object".to_string(),
            SnapshotValue::Bool(_) => "Boolean".to_string(),
            SnapshotValue::Text(_) => "String".to_string(),
            SnapshotValue::Object(object) => object.type_name.clone(),
        }
    }
}

struct SnapshotMember {
    descriptor: MemberDescriptor,
    value: SnapshotValue,
}

/// In-memory host object. Member values can be swapped after construction
/// to mimic the host recreating a nested object.
pub struct SnapshotObject {
    handle: ObjectHandle,
    type_name: String,
    methods: Vec<String>,
    members: RefCell<Vec<SnapshotMember>>,
}

impl SnapshotObject {
    pub fn build(spec: &ObjectSpec) -> Rc<SnapshotObject> {
        let members = spec
            .members
            .iter()
            .map(|member| {
                let value = match &member.value {
                    ValueSpec::Null => SnapshotValue::Null,
                    ValueSpec::Bool(value) => SnapshotValue::Bool(*value),
                    ValueSpec::Text(text) => SnapshotValue::Text(text.clone()),
                    ValueSpec::Fault { fault } => SnapshotValue::Fault(fault.clone()),
                    ValueSpec::Object(child) => SnapshotValue::Object(SnapshotObject::build(child)),
                };
                let type_name = member
                    .type_name
                    .clone()
                    .unwrap_or_else(|| value.implied_type_name());
                SnapshotMember {
                    descriptor: MemberDescriptor {
                        name: member.name.clone(),
                        type_name,
                        kind: member.kind,
                        readable: member.readable,
                    },
                    value,
                }
            })
            .collect();

        Rc::new(SnapshotObject {
            handle: spec.handle,
            type_name: spec.type_name.clone(),
            methods: spec.methods.clone(),
            members: RefCell::new(members),
        })
    }

    /// Visits `root` and every object nested beneath it, depth first.
    pub fn walk(root: &Rc<SnapshotObject>, visit: &mut dyn FnMut(&Rc<SnapshotObject>)) {
        visit(root);
        let children: Vec<Rc<SnapshotObject>> = root
            .members
            .borrow()
            .iter()
            .filter_map(|member| match &member.value {
                SnapshotValue::Object(child) => Some(child.clone()),
                _ => None,
            })
            .collect();
        for child in &children {
            SnapshotObject::walk(child, visit);
        }
    }

    /// Points `member` at a new object, returning the one it replaced. The
    /// member is appended when it does not exist yet.
    pub fn replace_object(
        &self,
        member: &str,
        object: Rc<SnapshotObject>,
    ) -> Option<Rc<SnapshotObject>> {
        let mut members = self.members.borrow_mut();
        let type_name = object.type_name.clone();
        if let Some(slot) = members.iter_mut().find(|slot| slot.descriptor.name == member) {
            slot.descriptor.type_name = type_name;
            match std::mem::replace(&mut slot.value, SnapshotValue::Object(object)) {
                SnapshotValue::Object(previous) => Some(previous),
                _ => None,
            }
        } else {
            members.push(SnapshotMember {
                descriptor: MemberDescriptor {
                    name: member.to_string(),
                    type_name,
                    kind: MemberKind::Field,
                    readable: true,
                },
                value: SnapshotValue::Object(object),
            });
            None
        }
    }
}

impl HostObject for SnapshotObject {
    fn handle(&self) -> ObjectHandle {
        self.handle
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn members(&self) -> Vec<MemberDescriptor> {
        self.members
            .borrow()
            .iter()
            .map(|member| member.descriptor.clone())
            .collect()
    }

    fn read(&self, member: &str) -> Result<HostValue, ReadError> {
        let members = self.members.borrow();
        let slot = members
            .iter()
            .find(|slot| slot.descriptor.name == member)
            .ok_or_else(|| ReadError::Missing(member.to_string()))?;
        if !slot.descriptor.readable {
            return Err(ReadError::Unreadable(member.to_string()));
        }
        match &slot.value {
            SnapshotValue::Null => Ok(HostValue::Null),
            SnapshotValue::Bool(value) => Ok(HostValue::Bool(*value)),
            SnapshotValue::Text(text) => Ok(HostValue::Text(text.clone())),
            SnapshotValue::Object(object) => Ok(HostValue::Object(object.clone() as HostRef)),
            SnapshotValue::Fault(reason) => Err(ReadError::Faulted {
                member: member.to_string(),
                reason: reason.clone(),
            }),
        }
    }

    fn responds_to(&self, method: &str) -> bool {
        self.methods.iter().any(|candidate| candidate == method)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn object(value: serde_json::Value) -> Rc<SnapshotObject> {
        let spec: ObjectSpec = serde_json::from_value(value).expect("valid object spec");
        SnapshotObject::build(&spec)
    }

    #[test]
    fn snapshot_reads_members_by_kind() {
        let actor = object(json!({
            "handle": 1,
            "type_name": "Player",
            "members": [
                { "name": "Nickname", "value": "Bear_2" },
                { "name": "IsYourPlayer", "value": false },
                { "name": "Secret", "readable": false, "value": "hidden" },
                { "name": "Broken", "value": { "fault": "getter threw" } },
                { "name": "Speaker", "value": {
                    "handle": 2, "type_name": "PhraseSpeaker", "methods": ["Play"]
                } },
            ]
        }));

        assert_eq!(actor.read("Nickname").unwrap().as_text(), Some("Bear_2"));
        assert_eq!(actor.read("IsYourPlayer").unwrap().as_bool(), Some(false));
        assert_eq!(
            actor.read("Secret").unwrap_err(),
            ReadError::Unreadable("Secret".to_string())
        );
        assert!(matches!(
            actor.read("Broken"),
            Err(ReadError::Faulted { .. })
        ));
        assert_eq!(
            actor.read("Missing").unwrap_err(),
            ReadError::Missing("Missing".to_string())
        );

        let speaker = actor.read("Speaker").unwrap();
        let speaker = speaker.as_object().expect("speaker object");
        assert_eq!(speaker.handle(), ObjectHandle(2));
        assert!(speaker.responds_to("Play"));

        let members = actor.members();
        assert_eq!(members[0].type_name, "String");
        assert_eq!(members[4].type_name, "PhraseSpeaker");
    }

    #[test]
    fn replace_object_swaps_nested_value() {
        let actor = object(json!({
            "handle": 1,
            "type_name": "Player",
            "members": [
                { "name": "Speaker", "value": { "handle": 2, "type_name": "PhraseSpeaker" } }
            ]
        }));
        let fresh = object(json!({ "handle": 3, "type_name": "PhraseSpeakerV2" }));

        let previous = actor.replace_object("Speaker", fresh).expect("previous speaker");
        assert_eq!(previous.handle(), ObjectHandle(2));
        let current = actor.read("Speaker").unwrap();
        assert_eq!(current.as_object().unwrap().handle(), ObjectHandle(3));
        assert_eq!(actor.members()[0].type_name, "PhraseSpeakerV2");
    }

    #[test]
    fn walk_visits_nested_objects() {
        let actor = object(json!({
            "handle": 10,
            "type_name": "Player",
            "members": [
                { "name": "Profile", "value": {
                    "handle": 11, "type_name": "Profile",
                    "members": [{ "name": "Info", "value": { "handle": 12, "type_name": "ProfileInfo" } }]
                } },
                { "name": "Speaker", "value": { "handle": 13, "type_name": "PhraseSpeaker" } }
            ]
        }));

        let mut seen = Vec::new();
        SnapshotObject::walk(&actor, &mut |object| seen.push(object.handle().0));
        assert_eq!(seen, vec![10, 11, 12, 13]);
    }
}
