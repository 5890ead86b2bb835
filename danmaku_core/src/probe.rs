//! Ordered capability probes over host objects.
//!
//! A [`ProbeChain`] tries cheap well-known member names first and only then
//! falls back to bounded structural scans. The first probe that yields an
//! acceptable value wins; nothing backtracks.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::host::{HostObject, HostValue, ReadError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Object,
    /// Non-blank text.
    Text,
    Bool,
}

impl Expect {
    fn accepts(self, value: &HostValue) -> bool {
        match (self, value) {
            (Expect::Object, HostValue::Object(_)) => true,
            (Expect::Text, HostValue::Text(text)) => !text.trim().is_empty(),
            (Expect::Bool, HostValue::Bool(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Probe {
    /// Reads the first of these members that holds an acceptable value.
    Accessor(Vec<String>),
    /// Follows a chain of member reads, e.g. `Profile.Info.GroupId`.
    Path(Vec<String>),
    /// Scans readable members whose declared type matches `pattern`.
    TypeScan {
        pattern: Regex,
        required_method: Option<String>,
    },
    /// Descends through members whose names match `container`, looking for
    /// one of `leaves` at each level.
    NestedScan {
        container: Regex,
        leaves: Vec<String>,
        max_depth: usize,
    },
}

impl Probe {
    pub fn accessor<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Probe::Accessor(names.into_iter().map(Into::into).collect())
    }

    /// Builds a path probe from dotted notation.
    pub fn path(dotted: &str) -> Self {
        Probe::Path(
            dotted
                .split('.')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct ProbeHit {
    pub value: HostValue,
    /// Position of the successful probe within its chain.
    pub probe: usize,
    /// Member (or dotted member path) the value was read from.
    pub member: String,
}

#[derive(Debug, Clone)]
pub struct ProbeChain {
    label: String,
    expect: Expect,
    probes: Vec<Probe>,
}

impl ProbeChain {
    pub fn new(label: impl Into<String>, expect: Expect, probes: Vec<Probe>) -> Self {
        Self {
            label: label.into(),
            expect,
            probes,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn resolve(&self, target: &dyn HostObject) -> Option<ProbeHit> {
        for (index, probe) in self.probes.iter().enumerate() {
            if let Some((member, value)) = self.run(probe, target) {
                log::trace!(
                    "{} probe {index} matched `{member}` on {} {}",
                    self.label,
                    target.type_name(),
                    target.handle()
                );
                return Some(ProbeHit {
                    value,
                    probe: index,
                    member,
                });
            }
        }
        log::debug!(
            "{} probes found nothing on {} {}",
            self.label,
            target.type_name(),
            target.handle()
        );
        None
    }

    pub fn resolve_text(&self, target: &dyn HostObject) -> Option<String> {
        self.resolve(target)
            .and_then(|hit| hit.value.as_text().map(|text| text.trim().to_string()))
    }

    pub fn resolve_bool(&self, target: &dyn HostObject) -> Option<bool> {
        self.resolve(target).and_then(|hit| hit.value.as_bool())
    }

    fn run(&self, probe: &Probe, target: &dyn HostObject) -> Option<(String, HostValue)> {
        match probe {
            Probe::Accessor(names) => names.iter().find_map(|name| {
                let value = read_member(target, name)?;
                self.expect
                    .accepts(&value)
                    .then(|| (name.clone(), value))
            }),
            Probe::Path(segments) => {
                let value = follow_path(target, segments)?;
                self.expect
                    .accepts(&value)
                    .then(|| (segments.join("."), value))
            }
            Probe::TypeScan {
                pattern,
                required_method,
            } => target
                .members()
                .into_iter()
                .filter(|member| member.readable && pattern.is_match(&member.type_name))
                .find_map(|member| {
                    let value = read_member(target, &member.name)?;
                    if !self.expect.accepts(&value) {
                        return None;
                    }
                    if let Some(method) = required_method {
                        if !value.as_object()?.responds_to(method) {
                            return None;
                        }
                    }
                    Some((member.name, value))
                }),
            Probe::NestedScan {
                container,
                leaves,
                max_depth,
            } => nested_scan(target, container, leaves, *max_depth, self.expect),
        }
    }
}

fn read_member(target: &dyn HostObject, name: &str) -> Option<HostValue> {
    match target.read(name) {
        Ok(value) => Some(value),
        Err(ReadError::Missing(_)) => None,
        Err(err) => {
            log::trace!("{} {}: {err}", target.type_name(), target.handle());
            None
        }
    }
}

fn follow_path(target: &dyn HostObject, segments: &[String]) -> Option<HostValue> {
    let (first, rest) = segments.split_first()?;
    let mut value = read_member(target, first)?;
    for segment in rest {
        let object = value.as_object()?.clone();
        value = read_member(object.as_ref(), segment)?;
    }
    Some(value)
}

fn nested_scan(
    target: &dyn HostObject,
    container: &Regex,
    leaves: &[String],
    depth: usize,
    expect: Expect,
) -> Option<(String, HostValue)> {
    for leaf in leaves {
        if let Some(value) = read_member(target, leaf) {
            if expect.accepts(&value) {
                return Some((leaf.clone(), value));
            }
        }
    }
    if depth == 0 {
        return None;
    }
    for member in target.members() {
        if !member.readable || !container.is_match(&member.name) {
            continue;
        }
        let Some(HostValue::Object(child)) = read_member(target, &member.name) else {
            continue;
        };
        if let Some((path, value)) = nested_scan(child.as_ref(), container, leaves, depth - 1, expect)
        {
            return Some((format!("{}.{path}", member.name), value));
        }
    }
    None
}

/// Member names and patterns used to build the default probe chains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub speaker_accessors: Vec<String>,
    pub speaker_type_pattern: String,
    pub speaker_method: Option<String>,
    pub affiliation_accessors: Vec<String>,
    pub affiliation_paths: Vec<String>,
    pub profile_containers: String,
    pub affiliation_leaves: Vec<String>,
    pub max_profile_depth: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            speaker_accessors: strings(&["Speaker", "speaker", "_speaker", "PhraseSpeaker"]),
            speaker_type_pattern: "speaker|voice|phrase".to_string(),
            speaker_method: Some("Play".to_string()),
            affiliation_accessors: strings(&["GroupId", "groupId"]),
            affiliation_paths: strings(&["Profile.Info.GroupId", "Profile.GroupId"]),
            profile_containers: "profile|info|settings".to_string(),
            affiliation_leaves: strings(&["GroupId", "groupId", "Group"]),
            max_profile_depth: 3,
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn case_insensitive(field: &'static str, pattern: &str) -> Result<Regex, ConfigError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ConfigError::InvalidPattern { field, source })
}

/// Every chain the registry, resolver and session consult.
#[derive(Debug, Clone)]
pub struct ProbeSet {
    pub speaker: ProbeChain,
    pub affiliation: ProbeChain,
    pub observer: ProbeChain,
    pub nickname: ProbeChain,
    pub role: ProbeChain,
    pub voice: ProbeChain,
}

impl ProbeSet {
    /// Chains built from the default `ProbeConfig`.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_config(&ProbeConfig::default())
    }

    pub fn from_config(config: &ProbeConfig) -> Result<Self, ConfigError> {
        let speaker = ProbeChain::new(
            "speaker",
            Expect::Object,
            vec![
                Probe::accessor(config.speaker_accessors.iter().cloned()),
                Probe::TypeScan {
                    pattern: case_insensitive("speaker_type_pattern", &config.speaker_type_pattern)?,
                    required_method: config.speaker_method.clone(),
                },
            ],
        );

        let mut affiliation_probes = vec![Probe::accessor(config.affiliation_accessors.iter().cloned())];
        affiliation_probes.extend(config.affiliation_paths.iter().map(|path| Probe::path(path)));
        affiliation_probes.push(Probe::NestedScan {
            container: case_insensitive("profile_containers", &config.profile_containers)?,
            leaves: config.affiliation_leaves.clone(),
            max_depth: config.max_profile_depth,
        });
        let affiliation = ProbeChain::new("affiliation", Expect::Text, affiliation_probes);

        let observer = ProbeChain::new(
            "observer",
            Expect::Bool,
            vec![Probe::accessor(["IsYourPlayer", "IsLocalPlayer", "IsLocal"])],
        );
        let nickname = ProbeChain::new(
            "nickname",
            Expect::Text,
            vec![
                Probe::path("Profile.Nickname"),
                Probe::path("Profile.Info.Nickname"),
                Probe::accessor(["Nickname", "Name"]),
            ],
        );
        let role = ProbeChain::new(
            "role",
            Expect::Text,
            vec![
                Probe::path("Profile.Info.Settings.Role"),
                Probe::accessor(["Role", "AiType"]),
            ],
        );
        let voice = ProbeChain::new(
            "voice",
            Expect::Text,
            vec![
                Probe::path("Profile.Info.Voice"),
                Probe::accessor(["Voice"]),
            ],
        );

        Ok(Self {
            speaker,
            affiliation,
            observer,
            nickname,
            role,
            voice,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::tests::object;
    use crate::host::ObjectHandle;
    use serde_json::json;

    fn speaker_chain() -> ProbeChain {
        ProbeSet::builtin().unwrap().speaker
    }

    #[test]
    fn accessor_wins_before_type_scan() {
        let actor = object(json!({
            "handle": 1,
            "type_name": "Player",
            "members": [
                { "name": "VoiceBox", "value": { "handle": 5, "type_name": "VoiceBox", "methods": ["Play"] } },
                { "name": "Speaker", "value": { "handle": 2, "type_name": "PhraseSpeaker" } }
            ]
        }));

        let hit = speaker_chain().resolve(actor.as_ref()).expect("speaker");
        assert_eq!(hit.probe, 0);
        assert_eq!(hit.member, "Speaker");
        assert_eq!(hit.value.as_object().unwrap().handle(), ObjectHandle(2));
    }

    #[test]
    fn type_scan_takes_first_playable_match() {
        let actor = object(json!({
            "handle": 1,
            "type_name": "BotOwner",
            "members": [
                { "name": "a", "value": { "handle": 3, "type_name": "VoiceSettings" } },
                { "name": "b", "readable": false, "value": { "handle": 4, "type_name": "PhraseSpeakerClass", "methods": ["Play"] } },
                { "name": "c", "value": { "handle": 5, "type_name": "PhraseSpeakerClass", "methods": ["Play"] } },
                { "name": "d", "value": { "handle": 6, "type_name": "SpeakerProxy", "methods": ["Play"] } }
            ]
        }));

        let hit = speaker_chain().resolve(actor.as_ref()).expect("speaker");
        assert_eq!(hit.probe, 1);
        assert_eq!(hit.member, "c");
        assert_eq!(hit.value.as_object().unwrap().handle(), ObjectHandle(5));
    }

    #[test]
    fn faulting_accessor_falls_through() {
        let actor = object(json!({
            "handle": 1,
            "type_name": "NetworkPlayer",
            "members": [
                { "name": "Speaker", "type_name": "PhraseSpeaker", "value": { "fault": "not yet spawned" } },
                { "name": "_voice", "value": { "handle": 9, "type_name": "PhraseSpeaker", "methods": ["Play"] } }
            ]
        }));

        let hit = speaker_chain().resolve(actor.as_ref()).expect("speaker");
        assert_eq!(hit.member, "_voice");
    }

    #[test]
    fn no_match_yields_none() {
        let actor = object(json!({
            "handle": 1,
            "type_name": "Corpse",
            "members": [{ "name": "Loot", "value": { "handle": 2, "type_name": "Inventory" } }]
        }));
        assert!(speaker_chain().resolve(actor.as_ref()).is_none());
    }

    #[test]
    fn nested_scan_reaches_profile_token() {
        let actor = object(json!({
            "handle": 1,
            "type_name": "ObservedPlayer",
            "members": [
                { "name": "Inventory", "value": { "handle": 2, "type_name": "Inventory",
                    "members": [{ "name": "GroupId", "value": "decoy" }] } },
                { "name": "PlayerProfile", "value": { "handle": 3, "type_name": "ProfileWrapper",
                    "members": [{ "name": "InfoClass", "value": { "handle": 4, "type_name": "Info",
                        "members": [{ "name": "GroupId", "value": "squad-7" }] } }] } }
            ]
        }));

        let chain = ProbeSet::builtin().unwrap().affiliation;
        let hit = chain.resolve(actor.as_ref()).expect("token");
        assert_eq!(hit.member, "PlayerProfile.InfoClass.GroupId");
        assert_eq!(hit.value.as_text(), Some("squad-7"));
    }

    #[test]
    fn invalid_type_pattern_names_its_field() {
        let config = ProbeConfig {
            speaker_type_pattern: "(".to_string(),
            ..ProbeConfig::default()
        };
        assert!(ProbeSet::builtin().is_ok());
        assert!(matches!(
            ProbeSet::from_config(&config),
            Err(ConfigError::InvalidPattern { field: "speaker_type_pattern", .. })
        ));
    }

    #[test]
    fn blank_text_is_not_accepted() {
        let actor = object(json!({
            "handle": 1,
            "type_name": "Player",
            "members": [{ "name": "GroupId", "value": "   " }]
        }));
        assert!(ProbeSet::builtin().unwrap()
            .affiliation
            .resolve_text(actor.as_ref())
            .is_none());
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let config = ProbeConfig {
            speaker_type_pattern: "(unclosed".to_string(),
            ..ProbeConfig::default()
        };
        let err = ProbeSet::from_config(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidPattern {
                field: "speaker_type_pattern",
                ..
            }
        ));
    }
}
