use std::{fs, path::Path};

use anyhow::{Context, Result};
use danmaku_core::{
    DisplayRequest, HostEvent, HostObject, LabelTables, ObjectHandle, RecordingDisplaySink,
    SceneGraph, SessionStats, SnapshotObject, SubtitleConfig, SubtitleSession, VoiceOutcome,
};
use serde::Serialize;

use crate::cli::Args;
use crate::script::{Script, ScriptEvent, World};

type ReplaySession = SubtitleSession<SceneGraph, RecordingDisplaySink>;

#[derive(Serialize)]
struct VoiceLogEntry {
    event: usize,
    speaker: ObjectHandle,
    clip: String,
    outcome: VoiceOutcome,
}

#[derive(Serialize)]
struct DisplayLog {
    stats: SessionStats,
    voice_lines: Vec<VoiceLogEntry>,
    requests: Vec<DisplayRequest>,
}

pub fn execute(args: Args) -> Result<()> {
    let Args {
        script,
        config,
        labels,
        display_log_json,
        scene_log_json,
        verbose: _,
    } = args;

    let script_path = script;
    let script = Script::from_json_file(&script_path)?;
    let config =
        SubtitleConfig::from_json_file(config.as_deref()).context("loading subtitle config")?;
    let labels = match labels.as_ref() {
        Some(path) => LabelTables::from_json_file(path)?,
        None => LabelTables::builtin().clone(),
    };

    let sink = RecordingDisplaySink::new();
    let mut session = SubtitleSession::new(config, labels, SceneGraph::new(), sink.clone())
        .context("building probe chains from config")?;
    let mut world = World::from_specs(&script.objects)
        .with_context(|| format!("loading world from {}", script_path.display()))?;

    let mut voice_lines = Vec::new();
    for (index, event) in script.events.into_iter().enumerate() {
        if let Some(entry) = apply(&mut session, &mut world, index, event)? {
            voice_lines.push(entry);
        }
    }

    let stats = session.stats();
    println!(
        "Replayed {} voice lines: {} displayed, {} unresolved, {} filtered, {} overlay failures ({} actors still present)",
        stats.voice_lines,
        stats.displayed,
        stats.unresolved,
        stats.filtered,
        stats.overlay_failures,
        world.len()
    );

    if let Some(path) = display_log_json.as_ref() {
        let log = DisplayLog {
            stats,
            voice_lines,
            requests: sink.requests(),
        };
        write_json(path, &log, "display log")?;
        println!("Saved display log to {}", path.display());
    }

    if let Some(path) = scene_log_json.as_ref() {
        write_json(path, session.ui().ops(), "scene log")?;
        println!("Saved scene log to {}", path.display());
    }

    Ok(())
}

fn apply(
    session: &mut ReplaySession,
    world: &mut World,
    index: usize,
    event: ScriptEvent,
) -> Result<Option<VoiceLogEntry>> {
    match event {
        ScriptEvent::ActorJoined { actor } => {
            let actor = world.actor(index, actor)?;
            session.handle(HostEvent::ActorJoined(actor));
        }
        ScriptEvent::ActorLeft { actor } => {
            let departed = world.actor(index, actor)?;
            world.release(actor);
            session.handle(HostEvent::ActorLeft(departed));
        }
        ScriptEvent::SpeakerRecreated {
            actor,
            member,
            speaker,
        } => {
            let fresh = SnapshotObject::build(&speaker);
            let previous = world
                .snapshot(index, actor)?
                .replace_object(&member, fresh);
            log::debug!(
                "actor {actor} speaker `{member}` recreated (was {:?})",
                previous.map(|object| object.handle())
            );
        }
        ScriptEvent::VoiceLine { speaker, clip } => {
            let outcome = session.voice_line(speaker, &clip);
            return Ok(Some(VoiceLogEntry {
                event: index,
                speaker,
                clip,
                outcome,
            }));
        }
        ScriptEvent::BattleUiOpened { container } => {
            session.ui_mut().open_battle_ui(container);
            session.handle(HostEvent::ContainerAvailable(container));
        }
        ScriptEvent::BattleUiDisabled { container } => {
            session.ui_mut().disable_container(container);
            session.handle(HostEvent::ContainerDisabled(container));
        }
        ScriptEvent::BattleUiClosed { container } => {
            session.ui_mut().close_container(container);
            session.handle(HostEvent::ContainerDestroyed(container));
        }
        ScriptEvent::AttachOverlay { container } => {
            let (controller, ui) = session.overlay_mut();
            if let Err(err) = controller.attach_to(ui, container) {
                eprintln!("[danmaku_replay] warning: event {index}: {err}");
            }
        }
        ScriptEvent::SessionEnded => {
            session.handle(HostEvent::SessionEnded);
        }
    }
    Ok(None)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, what: &str) -> Result<()> {
    let json =
        serde_json::to_string_pretty(value).with_context(|| format!("serializing {what} to JSON"))?;
    fs::write(path, &json).with_context(|| format!("writing {what} to {}", path.display()))
}
