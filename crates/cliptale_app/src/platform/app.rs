use std::io::{self, BufRead};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use cliptale_core::{update, AppState, AppViewModel, Msg};
use cliptale_engine::{
    resolve_path, Collaborators, FfmpegExtractor, OpenAiLabeler, OpenAiTranscriber,
    RenameJournal, TaskOrchestrator, SUPPORTED_VIDEO_EXTENSIONS,
};
use engine_logging::{engine_debug, engine_info, engine_warn, LogDestination, DEFAULT_LOG_FILE};
use log::LevelFilter;

use super::config::{api_key_from, AppConfig, ENV_API_KEY};
use super::effects::{EffectRunner, RunnerSettings};
use super::ui::commands::{self, SelectTarget, UiCommand, HELP_TEXT};
use super::ui::render::TerminalPresenter;

const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Where the control loop sends what the user should see.
pub trait Presenter {
    fn present(&mut self, view: &AppViewModel);
    fn notice(&mut self, text: &str);
}

pub fn run_app() -> anyhow::Result<()> {
    engine_logging::initialize(
        LogDestination::File(PathBuf::from(DEFAULT_LOG_FILE)),
        LevelFilter::Info,
    );

    let config_path = AppConfig::default_path()?;
    let mut config = AppConfig::load_or_init(&config_path);
    config.apply_env_from(|name| std::env::var(name).ok());
    let api_key = api_key_from(|name| std::env::var(name).ok());

    let journal = match &config.journal_path {
        Some(path) => RenameJournal::at(path),
        None => RenameJournal::open_default()?,
    };
    engine_info!("Using rename log {:?}", journal.path());

    let orchestrator =
        TaskOrchestrator::new(config.workers).context("failed to start the worker pool")?;
    let remote = config.remote_settings(api_key.clone().unwrap_or_default());
    let runtime = orchestrator.runtime_handle();
    let collaborators = Collaborators {
        extractor: Arc::new(FfmpegExtractor::new(&config.ffmpeg_path)),
        transcriber: Arc::new(OpenAiTranscriber::new(
            remote.clone(),
            &config.transcription_model,
            runtime.clone(),
        )?),
        labeler: Arc::new(OpenAiLabeler::new(remote, &config.llm_model, runtime)?),
    };
    let runner = EffectRunner::new(
        orchestrator,
        journal,
        collaborators,
        RunnerSettings {
            duration_limit_s: config.duration_limit_s,
            rename_template: config.rename_template.clone(),
        },
    );

    let mut controller = Controller::new(runner, TerminalPresenter::stdout());
    controller.notice("ClipTale: label and rename video clips. Type 'help' for commands.");
    if api_key.is_none() {
        engine_warn!("{} is not set", ENV_API_KEY);
        controller.notice(&format!(
            "Warning: {ENV_API_KEY} is not set; label generation will fail to authenticate."
        ));
    }

    let initial: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if !initial.is_empty() {
        let _ = controller.handle(UiCommand::Add(initial));
    }
    controller.present();

    let (line_tx, line_rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    loop {
        match line_rx.recv_timeout(TICK_INTERVAL) {
            Ok(line) => match commands::parse(&line) {
                Ok(Some(command)) => {
                    if controller.handle(command).is_break() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(err) => controller.notice(&err.to_string()),
            },
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                // Input closed; let in-flight tasks land before exiting.
                controller.drain_until_idle(TICK_INTERVAL);
                break;
            }
        }
        controller.tick();
    }

    engine_info!("ClipTale exiting");
    Ok(())
}

/// Owns the state and applies every message to it on the calling thread.
pub struct Controller<P: Presenter> {
    state: AppState,
    runner: EffectRunner,
    presenter: P,
}

impl<P: Presenter> Controller<P> {
    pub fn new(runner: EffectRunner, presenter: P) -> Self {
        Self {
            state: AppState::new(),
            runner,
            presenter,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.runner.is_idle()
    }

    pub fn present(&mut self) {
        self.presenter.present(&self.state.view());
    }

    pub fn notice(&mut self, text: &str) {
        self.presenter.notice(text);
    }

    pub fn dispatch(&mut self, msg: Msg) {
        engine_debug!("dispatch {:?}", msg);
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        if state.consume_dirty() {
            self.presenter.present(&state.view());
        }
        self.state = state;
        self.runner.run(effects);
    }

    /// Feeds finished work back into the state.
    pub fn tick(&mut self) {
        for msg in self.runner.poll() {
            self.dispatch(msg);
        }
        self.dispatch(Msg::Tick);
    }

    pub fn drain_until_idle(&mut self, interval: Duration) {
        while !self.is_idle() {
            self.tick();
            thread::sleep(interval);
        }
        self.tick();
    }

    pub fn handle(&mut self, command: UiCommand) -> ControlFlow<()> {
        match command {
            UiCommand::Add(paths) => self.add(paths),
            UiCommand::Select(target) => self.select(target),
            UiCommand::Deselect => self.dispatch(Msg::Select(None)),
            UiCommand::Remove => {
                if self.require_selection() {
                    if self.state.any_busy() {
                        self.notice("Cannot remove clips while a task is running.");
                    } else {
                        self.dispatch(Msg::RemoveSelected);
                    }
                }
            }
            UiCommand::Generate => {
                if self.require_idle_selection() {
                    self.dispatch(Msg::GenerateClicked);
                }
            }
            UiCommand::Label(text) => {
                if self.require_idle_selection() {
                    self.dispatch(Msg::LabelEdited(text));
                }
            }
            UiCommand::Save => {
                if self.require_idle_selection() && self.require_no_rename() {
                    self.dispatch(Msg::SaveClicked);
                }
            }
            UiCommand::Revert => {
                if self.require_idle_selection() && self.require_no_rename() {
                    if self.state.details().can_revert {
                        self.dispatch(Msg::RevertClicked);
                    } else {
                        self.notice("This clip has no rename to revert.");
                    }
                }
            }
            UiCommand::List => self.present(),
            UiCommand::Help => self.notice(HELP_TEXT),
            UiCommand::Quit => {
                if !self.is_idle() {
                    self.notice("Waiting for running tasks to finish...");
                    self.drain_until_idle(TICK_INTERVAL);
                }
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn add(&mut self, paths: Vec<PathBuf>) {
        if self.state.any_busy() {
            self.notice("Cannot add clips while a task is running.");
            return;
        }
        let mut accepted = Vec::new();
        for path in paths {
            if !is_supported_video(&path) {
                self.notice(&format!(
                    "Skipping {}: not a supported video file",
                    path.display()
                ));
                continue;
            }
            if !path.is_file() {
                self.notice(&format!("Skipping {}: Video file not found", path.display()));
                continue;
            }
            match resolve_path(&path) {
                Ok(resolved) => accepted.push(resolved),
                Err(err) => self.notice(&format!("Skipping {}: {}", path.display(), err)),
            }
        }
        if !accepted.is_empty() {
            self.dispatch(Msg::AddFiles(accepted));
        }
    }

    fn select(&mut self, target: SelectTarget) {
        let path = match target {
            SelectTarget::Index(index) => index
                .checked_sub(1)
                .and_then(|i| self.state.items().get(i))
                .map(|item| item.path().to_path_buf()),
            SelectTarget::Path(path) => resolve_path(&path)
                .ok()
                .filter(|resolved| self.state.item(resolved).is_some()),
        };
        match path {
            Some(path) => self.dispatch(Msg::Select(Some(path))),
            None => self.notice("No such clip. Use 'list' to see the clips."),
        }
    }

    fn require_selection(&mut self) -> bool {
        if self.state.selected_item().is_some() {
            return true;
        }
        self.notice("No clip selected. Use 'select <n>' first.");
        false
    }

    fn require_idle_selection(&mut self) -> bool {
        match self.state.selected_item() {
            Some(item) if item.is_busy() => {
                self.notice("The selected clip is busy.");
                false
            }
            Some(_) => true,
            None => {
                self.notice("No clip selected. Use 'select <n>' first.");
                false
            }
        }
    }

    fn require_no_rename(&mut self) -> bool {
        if self.state.renaming_in_flight() {
            self.notice("Another save or revert is still running.");
            return false;
        }
        true
    }
}

fn is_supported_video(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| SUPPORTED_VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Instant;

    use cliptale_core::ClipStatus;
    use cliptale_engine::{
        AudioArtifact, AudioExtractor, ExtractError, LabelGenerator, RemoteError, Transcriber,
        JOURNAL_FILENAME,
    };
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        views: Vec<AppViewModel>,
        notices: Vec<String>,
    }

    impl Presenter for Recorder {
        fn present(&mut self, view: &AppViewModel) {
            self.views.push(view.clone());
        }

        fn notice(&mut self, text: &str) {
            self.notices.push(text.to_string());
        }
    }

    struct Stub {
        audio_dir: PathBuf,
        label: Result<String, RemoteError>,
    }

    impl AudioExtractor for Stub {
        fn extract(&self, _: &Path, _: u32, _: u32) -> Result<AudioArtifact, ExtractError> {
            let path = self.audio_dir.join("audio.wav");
            fs::write(&path, b"RIFF").unwrap();
            Ok(AudioArtifact::new(path))
        }
    }

    impl Transcriber for Stub {
        fn transcribe(&self, _: &Path) -> Result<String, RemoteError> {
            Ok("a dog barks".to_string())
        }
    }

    impl LabelGenerator for Stub {
        fn generate(&self, _: &str) -> Result<String, RemoteError> {
            self.label.clone()
        }
    }

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
        controller: Controller<Recorder>,
    }

    fn fixture(label: Result<String, RemoteError>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        let stub = Arc::new(Stub {
            audio_dir: root.clone(),
            label,
        });
        let runner = EffectRunner::new(
            TaskOrchestrator::new(2).unwrap(),
            RenameJournal::at(root.join(JOURNAL_FILENAME)),
            Collaborators {
                extractor: stub.clone(),
                transcriber: stub.clone(),
                labeler: stub,
            },
            RunnerSettings {
                duration_limit_s: 15,
                rename_template: Some("{label}.mp4".to_string()),
            },
        );
        Fixture {
            _dir: dir,
            root,
            controller: Controller::new(runner, Recorder::default()),
        }
    }

    fn settle(controller: &mut Controller<Recorder>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !controller.is_idle() && Instant::now() < deadline {
            controller.tick();
            thread::sleep(Duration::from_millis(5));
        }
        controller.tick();
    }

    fn status_text(controller: &Controller<Recorder>) -> String {
        controller.state().details().status_text
    }

    #[test]
    fn generate_save_revert_through_the_control_loop() {
        let mut fx = fixture(Ok("dog_bark".to_string()));
        let clip = fx.root.join("clip.mp4");
        fs::write(&clip, b"video").unwrap();
        let c = &mut fx.controller;

        let _ = c.handle(UiCommand::Add(vec![clip.clone()]));
        let _ = c.handle(UiCommand::Select(SelectTarget::Index(1)));
        settle(c);
        assert!(!c.state().details().can_revert);

        let _ = c.handle(UiCommand::Generate);
        assert_eq!(status_text(c), "Initializing label generation...");
        settle(c);
        assert_eq!(status_text(c), "Label generated successfully.");
        assert_eq!(c.state().details().label, "dog_bark");

        let _ = c.handle(UiCommand::Save);
        settle(c);
        let saved = fx.root.join("dog_bark.mp4");
        assert!(saved.is_file());
        assert_eq!(status_text(c), "Label saved");
        assert_eq!(c.state().selected(), Some(saved.as_path()));
        assert!(c.state().details().can_revert);

        let _ = c.handle(UiCommand::Revert);
        settle(c);
        assert!(clip.is_file());
        assert_eq!(status_text(c), "Reverted successfully.");
        assert_eq!(
            c.state().selected_item().map(|item| item.status()),
            Some(ClipStatus::Reverted)
        );
        assert!(!c.state().details().can_revert);
        assert!(!c.presenter.views.is_empty());
    }

    #[test]
    fn auth_failure_is_shown_verbatim() {
        let mut fx = fixture(Err(RemoteError::auth(
            "Authentication failed. Please check LLM_API_KEY.",
        )));
        let clip = fx.root.join("clip.mp4");
        fs::write(&clip, b"video").unwrap();
        let c = &mut fx.controller;

        let _ = c.handle(UiCommand::Add(vec![clip]));
        let _ = c.handle(UiCommand::Select(SelectTarget::Index(1)));
        let _ = c.handle(UiCommand::Generate);
        settle(c);
        assert_eq!(
            status_text(c),
            "Authentication failed. Please check LLM_API_KEY."
        );
    }

    #[test]
    fn unsupported_and_missing_files_are_skipped() {
        let mut fx = fixture(Ok("unused".to_string()));
        let text = fx.root.join("notes.txt");
        fs::write(&text, b"hello").unwrap();
        let c = &mut fx.controller;

        let _ = c.handle(UiCommand::Add(vec![text, fx.root.join("gone.mp4")]));
        assert!(c.state().items().is_empty());
        assert_eq!(c.presenter.notices.len(), 2);
        assert!(c.presenter.notices[1].contains("Video file not found"));
    }

    #[test]
    fn second_save_is_refused_while_first_runs() {
        let mut fx = fixture(Ok("unused".to_string()));
        let first = fx.root.join("first.mp4");
        let second = fx.root.join("second.mp4");
        fs::write(&first, b"first").unwrap();
        fs::write(&second, b"second").unwrap();
        let c = &mut fx.controller;

        let _ = c.handle(UiCommand::Add(vec![first.clone(), second.clone()]));
        for index in [2, 1] {
            let _ = c.handle(UiCommand::Select(SelectTarget::Index(index)));
            let _ = c.handle(UiCommand::Label("dog_bark".to_string()));
        }
        let _ = c.handle(UiCommand::Save);
        let _ = c.handle(UiCommand::Select(SelectTarget::Index(2)));
        let _ = c.handle(UiCommand::Save);
        assert_eq!(
            c.presenter.notices.last().map(String::as_str),
            Some("Another save or revert is still running.")
        );

        settle(c);
        let _ = c.handle(UiCommand::Save);
        settle(c);
        assert_eq!(fs::read(fx.root.join("dog_bark.mp4")).unwrap(), b"first");
        assert_eq!(fs::read(&second).unwrap(), b"second");
        assert!(status_text(c).starts_with("Error:"));
    }

    #[test]
    fn commands_need_a_selection() {
        let mut fx = fixture(Ok("unused".to_string()));
        let c = &mut fx.controller;
        let _ = c.handle(UiCommand::Save);
        assert_eq!(
            c.presenter.notices,
            vec!["No clip selected. Use 'select <n>' first.".to_string()]
        );
        assert!(c.handle(UiCommand::Quit).is_break());
    }
}
