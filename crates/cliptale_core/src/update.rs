use crate::{AppState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::AddFiles(paths) => {
            // File operations stay locked while any task is in flight.
            if state.any_busy() {
                return (state, Vec::new());
            }
            for path in paths {
                state.add_item(path);
            }
            Vec::new()
        }
        Msg::Select(path) => {
            if !state.select(path) {
                return (state, Vec::new());
            }
            // Revertibility always comes from the journal, never from item state.
            match state.selected() {
                Some(path) => vec![Effect::CheckRevertible {
                    path: path.to_path_buf(),
                }],
                None => Vec::new(),
            }
        }
        Msg::RemoveSelected => {
            if !state.any_busy() {
                state.remove_selected();
            }
            Vec::new()
        }
        Msg::GenerateClicked => match state.start_generate() {
            Some(path) => vec![Effect::Generate { path }],
            None => Vec::new(),
        },
        Msg::LabelEdited(text) => {
            state.set_label(text);
            Vec::new()
        }
        Msg::SaveClicked => match state.start_save() {
            Some((path, label)) => vec![Effect::Save { path, label }],
            None => Vec::new(),
        },
        Msg::RevertClicked => match state.start_revert() {
            Some(path) => vec![Effect::Revert { path }],
            None => Vec::new(),
        },
        Msg::StageChanged { path, stage } => {
            state.apply_stage(&path, stage);
            Vec::new()
        }
        Msg::GenerateDone { path, result } => {
            state.apply_generated(&path, result);
            Vec::new()
        }
        Msg::SaveDone { path, result } => {
            let check = match state.apply_saved(&path, result) {
                Some(new_path) => new_path,
                None => path,
            };
            vec![Effect::CheckRevertible { path: check }]
        }
        Msg::RevertDone { path, result } => {
            let check = match state.apply_reverted(&path, result) {
                Some(original) => original,
                None => path,
            };
            vec![Effect::CheckRevertible { path: check }]
        }
        Msg::RevertibilityChecked { path, tracked } => {
            state.set_revertible(&path, tracked);
            Vec::new()
        }
        Msg::Tick => Vec::new(),
    };

    (state, effects)
}
