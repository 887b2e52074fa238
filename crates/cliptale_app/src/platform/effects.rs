use std::collections::HashMap;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

use cliptale_core::{Effect, FailureKind, Msg, SavedFile, Stage, TaskFailure};
use cliptale_engine::{
    revert, ChannelProgressSink, Collaborators, ErrorKind, LabelingSession, RenameJournal,
    RenameTemplate, RevertError, RevertOutcome, SessionError, SessionProgress, TaskError,
    TaskHandle, TaskOrchestrator, TaskPoll,
};
use engine_logging::{engine_info, engine_warn};

/// Settings applied to every session the runner starts.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub duration_limit_s: u32,
    pub rename_template: Option<String>,
}

enum PendingTask {
    Generate(TaskHandle<String, SessionError>),
    Save(TaskHandle<PathBuf, SessionError>),
    Revert(TaskHandle<RevertOutcome, RevertError>),
}

impl PendingTask {
    fn poll(&mut self, path: &Path) -> Option<Msg> {
        let path = path.to_path_buf();
        match self {
            PendingTask::Generate(handle) => match handle.poll() {
                TaskPoll::Pending => None,
                TaskPoll::Done(result) => Some(Msg::GenerateDone {
                    path,
                    result: result.map_err(|err| task_failure(err, session_failure)),
                }),
            },
            PendingTask::Save(handle) => match handle.poll() {
                TaskPoll::Pending => None,
                TaskPoll::Done(result) => Some(Msg::SaveDone {
                    path,
                    result: saved_file(result),
                }),
            },
            PendingTask::Revert(handle) => match handle.poll() {
                TaskPoll::Pending => None,
                TaskPoll::Done(result) => Some(Msg::RevertDone {
                    path,
                    result: result
                        .map(|outcome| outcome.original_path)
                        .map_err(|err| task_failure(err, revert_failure)),
                }),
            },
        }
    }
}

/// Executes effects on the orchestrator and turns finished tasks back into messages.
pub struct EffectRunner {
    orchestrator: TaskOrchestrator,
    journal: Arc<RenameJournal>,
    collaborators: Collaborators,
    settings: RunnerSettings,
    pending: HashMap<PathBuf, PendingTask>,
    checks: Vec<(PathBuf, TaskHandle<bool, Infallible>)>,
    progress_tx: mpsc::Sender<SessionProgress>,
    progress_rx: mpsc::Receiver<SessionProgress>,
}

impl EffectRunner {
    pub fn new(
        orchestrator: TaskOrchestrator,
        journal: RenameJournal,
        collaborators: Collaborators,
        settings: RunnerSettings,
    ) -> Self {
        let (progress_tx, progress_rx) = mpsc::channel();
        Self {
            orchestrator,
            journal: Arc::new(journal),
            collaborators,
            settings,
            pending: HashMap::new(),
            checks: Vec::new(),
            progress_tx,
            progress_rx,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.checks.is_empty()
    }

    pub fn run(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Generate { path } => {
                    engine_info!("Generate label for {:?}", path);
                    let handle = self.submit_generate(path.clone());
                    self.track(path, PendingTask::Generate(handle));
                }
                Effect::Save { path, label } => {
                    engine_info!("Save {:?} with label {:?}", path, label);
                    let handle = self.submit_save(path.clone(), label);
                    self.track(path, PendingTask::Save(handle));
                }
                Effect::Revert { path } => {
                    engine_info!("Revert {:?}", path);
                    let journal = self.journal.clone();
                    let target = path.clone();
                    let handle = self
                        .orchestrator
                        .submit("revert", move || revert(&journal, &target));
                    self.track(path, PendingTask::Revert(handle));
                }
                Effect::CheckRevertible { path } => {
                    let journal = self.journal.clone();
                    let target = path.clone();
                    let handle = self
                        .orchestrator
                        .submit("check-revertible", move || {
                            Ok::<_, Infallible>(journal.is_tracked(&target))
                        });
                    self.checks.push((path, handle));
                }
            }
        }
    }

    /// Drains stage updates and collects every finished task as a message.
    pub fn poll(&mut self) -> Vec<Msg> {
        let finished: Vec<(PathBuf, Msg)> = self
            .pending
            .iter_mut()
            .filter_map(|(path, task)| task.poll(path).map(|msg| (path.clone(), msg)))
            .collect();

        // Drained after polling so every stage of a finished task precedes its result.
        let mut msgs: Vec<Msg> = self
            .progress_rx
            .try_iter()
            .map(|progress| Msg::StageChanged {
                path: progress.path,
                stage: map_stage(progress.stage),
            })
            .collect();
        for (path, msg) in finished {
            self.pending.remove(&path);
            msgs.push(msg);
        }

        self.checks.retain_mut(|(path, handle)| match handle.poll() {
            TaskPoll::Pending => true,
            TaskPoll::Done(result) => {
                msgs.push(Msg::RevertibilityChecked {
                    path: path.clone(),
                    tracked: result.unwrap_or(false),
                });
                false
            }
        });
        msgs
    }

    fn track(&mut self, path: PathBuf, task: PendingTask) {
        if self.pending.insert(path.clone(), task).is_some() {
            engine_warn!("Replaced an unfinished task for {:?}", path);
        }
    }

    fn submit_generate(&self, path: PathBuf) -> TaskHandle<String, SessionError> {
        let collaborators = self.collaborators.clone();
        let sink = ChannelProgressSink::new(self.progress_tx.clone());
        let duration = self.settings.duration_limit_s;
        self.orchestrator.submit("generate", move || {
            let mut session = LabelingSession::new(&path, duration)?;
            session.generate(&collaborators, &sink)
        })
    }

    fn submit_save(&self, path: PathBuf, label: String) -> TaskHandle<PathBuf, SessionError> {
        let journal = self.journal.clone();
        let template = self.settings.rename_template.clone();
        let duration = self.settings.duration_limit_s;
        self.orchestrator.submit("save", move || {
            let template = match template {
                Some(text) => RenameTemplate::parse(&text)?,
                None => RenameTemplate::for_source(&path),
            };
            let mut session = LabelingSession::new(&path, duration)?.with_template(template);
            session.save(&label, &journal)
        })
    }
}

fn map_stage(stage: cliptale_engine::Stage) -> Stage {
    match stage {
        cliptale_engine::Stage::Extracting => Stage::Extracting,
        cliptale_engine::Stage::Transcribing => Stage::Transcribing,
        cliptale_engine::Stage::Labeling => Stage::Labeling,
    }
}

// A rename that could not be journaled still moved the file.
fn saved_file(result: Result<PathBuf, TaskError<SessionError>>) -> Result<SavedFile, TaskFailure> {
    match result {
        Ok(new_path) => Ok(SavedFile {
            new_path,
            warning: None,
        }),
        Err(TaskError::Failed(SessionError::JournalWrite { new_path, source })) => {
            engine_warn!("Saved {:?} without a rename log entry: {}", new_path, source);
            Ok(SavedFile {
                new_path,
                warning: Some(format!("not recorded in rename log: {source}")),
            })
        }
        Err(err) => Err(task_failure(err, session_failure)),
    }
}

fn task_failure<E>(err: TaskError<E>, map: fn(&E) -> TaskFailure) -> TaskFailure {
    match err {
        TaskError::Failed(err) => map(&err),
        TaskError::Panicked(message) => TaskFailure::new(FailureKind::Internal, message),
        TaskError::Disconnected => {
            TaskFailure::new(FailureKind::Internal, "task ended without a result")
        }
    }
}

fn session_failure(err: &SessionError) -> TaskFailure {
    let kind = match err {
        SessionError::DestinationExists(_) | SessionError::JournalConflict(_) => {
            FailureKind::Collision
        }
        SessionError::SourceNotFound(_) | SessionError::AudioMissing(_) => FailureKind::NotFound,
        _ => match err.kind() {
            ErrorKind::Validation => FailureKind::Validation,
            ErrorKind::Io => FailureKind::Io,
            ErrorKind::Extraction => FailureKind::Extraction,
            ErrorKind::Auth => FailureKind::Auth,
            ErrorKind::Connectivity => FailureKind::Connectivity,
            ErrorKind::Call => FailureKind::Call,
        },
    };
    TaskFailure::new(kind, err.to_string())
}

fn revert_failure(err: &RevertError) -> TaskFailure {
    let kind = match err {
        RevertError::NotFound(_) => FailureKind::NotFound,
        RevertError::Collision { .. } => FailureKind::Collision,
        RevertError::Rename { .. } | RevertError::Journal(_) => FailureKind::Io,
    };
    TaskFailure::new(kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, Instant};

    use cliptale_engine::{
        AudioArtifact, AudioExtractor, ExtractError, LabelGenerator, RemoteError, Transcriber,
        JOURNAL_FILENAME,
    };
    use tempfile::TempDir;

    struct WavExtractor(PathBuf);

    impl AudioExtractor for WavExtractor {
        fn extract(&self, _: &Path, _: u32, _: u32) -> Result<AudioArtifact, ExtractError> {
            let path = self.0.join("audio.wav");
            fs::write(&path, b"RIFF").unwrap();
            Ok(AudioArtifact::new(path))
        }
    }

    struct Fixed(&'static str);

    impl Transcriber for Fixed {
        fn transcribe(&self, _: &Path) -> Result<String, RemoteError> {
            Ok(self.0.to_string())
        }
    }

    impl LabelGenerator for Fixed {
        fn generate(&self, _: &str) -> Result<String, RemoteError> {
            Ok(self.0.to_string())
        }
    }

    fn runner(root: &Path, template: Option<&str>) -> EffectRunner {
        let collaborators = Collaborators {
            extractor: Arc::new(WavExtractor(root.to_path_buf())),
            transcriber: Arc::new(Fixed("a dog barks")),
            labeler: Arc::new(Fixed("dog_bark")),
        };
        EffectRunner::new(
            TaskOrchestrator::new(2).unwrap(),
            RenameJournal::at(root.join(JOURNAL_FILENAME)),
            collaborators,
            RunnerSettings {
                duration_limit_s: 15,
                rename_template: template.map(str::to_string),
            },
        )
    }

    fn drain(runner: &mut EffectRunner) -> Vec<Msg> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut msgs = Vec::new();
        while !runner.is_idle() && Instant::now() < deadline {
            msgs.extend(runner.poll());
            std::thread::sleep(Duration::from_millis(5));
        }
        msgs.extend(runner.poll());
        msgs
    }

    #[test]
    fn generate_reports_stages_then_label() {
        let dir = TempDir::new().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        let clip = root.join("clip.mp4");
        fs::write(&clip, b"video").unwrap();

        let mut runner = runner(&root, None);
        runner.run(vec![Effect::Generate { path: clip.clone() }]);
        let msgs = drain(&mut runner);

        let stages = msgs
            .iter()
            .filter(|m| matches!(m, Msg::StageChanged { .. }))
            .count();
        assert_eq!(stages, 3);
        assert_eq!(
            msgs.last(),
            Some(&Msg::GenerateDone {
                path: clip,
                result: Ok("dog_bark".to_string()),
            })
        );
    }

    #[test]
    fn save_uses_the_source_extension_by_default() {
        let dir = TempDir::new().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        let clip = root.join("clip.mkv");
        fs::write(&clip, b"video").unwrap();

        let mut runner = runner(&root, None);
        runner.run(vec![Effect::Save {
            path: clip.clone(),
            label: "dog_bark".to_string(),
        }]);
        let msgs = drain(&mut runner);

        assert_eq!(
            msgs,
            vec![Msg::SaveDone {
                path: clip,
                result: Ok(SavedFile {
                    new_path: root.join("dog_bark.mkv"),
                    warning: None,
                }),
            }]
        );
    }

    #[test]
    fn invalid_configured_template_is_a_validation_failure() {
        let dir = TempDir::new().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        let clip = root.join("clip.mp4");
        fs::write(&clip, b"video").unwrap();

        let mut runner = runner(&root, Some("no_placeholder"));
        runner.run(vec![Effect::Save {
            path: clip.clone(),
            label: "dog_bark".to_string(),
        }]);
        let msgs = drain(&mut runner);

        let expected = TaskFailure::new(
            FailureKind::Validation,
            "Template must contain '{label}' placeholder",
        );
        assert_eq!(
            msgs,
            vec![Msg::SaveDone {
                path: clip.clone(),
                result: Err(expected),
            }]
        );
        assert!(clip.is_file());
    }

    #[test]
    fn revert_and_revertibility_round_trip() {
        let dir = TempDir::new().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        let clip = root.join("clip.mp4");
        fs::write(&clip, b"video").unwrap();
        let saved = root.join("dog_bark.mp4");

        let mut runner = runner(&root, Some("{label}.mp4"));
        runner.run(vec![Effect::Save {
            path: clip.clone(),
            label: "dog_bark".to_string(),
        }]);
        drain(&mut runner);

        runner.run(vec![Effect::CheckRevertible {
            path: saved.clone(),
        }]);
        assert_eq!(
            drain(&mut runner),
            vec![Msg::RevertibilityChecked {
                path: saved.clone(),
                tracked: true,
            }]
        );

        runner.run(vec![Effect::Revert {
            path: saved.clone(),
        }]);
        assert_eq!(
            drain(&mut runner),
            vec![Msg::RevertDone {
                path: saved.clone(),
                result: Ok(clip.clone()),
            }]
        );
        assert!(clip.is_file());

        runner.run(vec![Effect::Revert {
            path: saved.clone(),
        }]);
        match drain(&mut runner).as_slice() {
            [Msg::RevertDone { result: Err(failure), .. }] => {
                assert_eq!(failure.kind, FailureKind::NotFound)
            }
            other => panic!("unexpected messages: {other:?}"),
        }
    }
}
