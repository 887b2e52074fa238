use std::path::PathBuf;
use std::sync::Once;

use cliptale_core::{update, AppState, ClipStatus, Effect, Msg, STATUS_READY};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn clip(name: &str) -> PathBuf {
    PathBuf::from("/media").join(name)
}

fn with_selected(name: &str) -> AppState {
    let (state, _) = update(AppState::new(), Msg::AddFiles(vec![clip(name)]));
    let (state, _) = update(state, Msg::Select(Some(clip(name))));
    state
}

#[test]
fn add_files_skips_duplicates_and_marks_dirty() {
    init_logging();
    let (mut state, effects) = update(
        AppState::new(),
        Msg::AddFiles(vec![clip("a.mp4"), clip("b.mov"), clip("a.mp4")]),
    );

    assert!(effects.is_empty());
    assert!(state.consume_dirty());
    let names: Vec<_> = state.view().rows.iter().map(|r| r.file_name.clone()).collect();
    assert_eq!(names, vec!["a.mp4".to_string(), "b.mov".to_string()]);
    assert!(state.items().iter().all(|item| item.status() == ClipStatus::New));
}

#[test]
fn selecting_asks_the_journal_for_revertibility() {
    init_logging();
    let (state, _) = update(AppState::new(), Msg::AddFiles(vec![clip("a.mp4")]));
    let (state, effects) = update(state, Msg::Select(Some(clip("a.mp4"))));

    assert_eq!(
        effects,
        vec![Effect::CheckRevertible {
            path: clip("a.mp4")
        }]
    );
    let details = state.details();
    assert_eq!(details.status_text, STATUS_READY);
    assert!(details.can_generate);
    assert!(!details.can_revert);

    let (state, _) = update(
        state,
        Msg::RevertibilityChecked {
            path: clip("a.mp4"),
            tracked: true,
        },
    );
    assert!(state.details().can_revert);
}

#[test]
fn selecting_unknown_path_clears_selection() {
    init_logging();
    let state = with_selected("a.mp4");
    let (state, effects) = update(state, Msg::Select(Some(clip("missing.mp4"))));

    // Unknown paths resolve to no selection.
    assert!(effects.is_empty());
    assert_eq!(state.selected(), None);
    assert_eq!(state.details().status_text, "N/A");
}

#[test]
fn remove_selected_drops_item_and_selection() {
    init_logging();
    let state = with_selected("a.mp4");
    let (state, effects) = update(state, Msg::RemoveSelected);

    assert!(effects.is_empty());
    assert!(state.items().is_empty());
    assert_eq!(state.selected(), None);
}

#[test]
fn generate_is_single_flight_per_item() {
    init_logging();
    let state = with_selected("a.mp4");
    let (state, effects) = update(state, Msg::GenerateClicked);
    assert_eq!(
        effects,
        vec![Effect::Generate {
            path: clip("a.mp4")
        }]
    );
    assert_eq!(
        state.details().status_text,
        "Initializing label generation..."
    );

    let (state, effects) = update(state, Msg::GenerateClicked);
    assert!(effects.is_empty());
    let (state, effects) = update(state, Msg::SaveClicked);
    assert!(effects.is_empty());
    let details = state.details();
    assert!(!details.can_generate);
    assert!(!details.can_save);
    assert!(!details.can_add);
    assert!(!details.can_remove);
}

#[test]
fn file_operations_are_locked_while_busy() {
    init_logging();
    let state = with_selected("a.mp4");
    let (state, _) = update(state, Msg::GenerateClicked);

    let (state, _) = update(state, Msg::AddFiles(vec![clip("b.mp4")]));
    assert_eq!(state.items().len(), 1);

    let (state, _) = update(state, Msg::RemoveSelected);
    assert_eq!(state.items().len(), 1);
    assert_eq!(state.selected(), Some(clip("a.mp4").as_path()));
}

#[test]
fn empty_label_save_is_rejected_without_effect() {
    init_logging();
    let state = with_selected("a.mp4");
    let (state, _) = update(state, Msg::LabelEdited("   ".to_string()));
    let (state, effects) = update(state, Msg::SaveClicked);

    assert!(effects.is_empty());
    let details = state.details();
    assert_eq!(details.status_text, "Error: Label cannot be empty.");
    assert!(details.can_save);
    assert!(!state.any_busy());
}

#[test]
fn save_sends_trimmed_label() {
    init_logging();
    let state = with_selected("a.mp4");
    let (state, _) = update(state, Msg::LabelEdited("  dog_bark \n".to_string()));
    let (state, effects) = update(state, Msg::SaveClicked);

    assert_eq!(
        effects,
        vec![Effect::Save {
            path: clip("a.mp4"),
            label: "dog_bark".to_string(),
        }]
    );
    assert_eq!(state.details().status_text, "Saving label...");
}

#[test]
fn revert_requires_journal_confirmation() {
    init_logging();
    let state = with_selected("a.mp4");
    let (state, effects) = update(state, Msg::RevertClicked);
    assert!(effects.is_empty());

    let (state, _) = update(
        state,
        Msg::RevertibilityChecked {
            path: clip("a.mp4"),
            tracked: true,
        },
    );
    let (state, effects) = update(state, Msg::RevertClicked);
    assert_eq!(
        effects,
        vec![Effect::Revert {
            path: clip("a.mp4")
        }]
    );
    assert_eq!(state.details().status_text, "Reverting rename...");
}
