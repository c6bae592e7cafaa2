use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, StoreBackend};
use crate::countdown::CountdownTicker;
use crate::error::AppError;
use crate::prompt::{ChannelPrompt, UiRequest};
use crate::store::{FirestoreStore, MemoryStore, TaskStore};
use crate::task_list::TaskList;
use crate::terminal::{restore_terminal, setup_terminal, InputReader, Tui};
use crate::ui::{self, Action, App};
use tokio::sync::mpsc;

pub fn build_store(cfg: &AppConfig) -> Result<Arc<dyn TaskStore>, AppError> {
    let store: Arc<dyn TaskStore> = match cfg.store.backend {
        StoreBackend::Firestore => Arc::new(FirestoreStore::new(&cfg.firestore)?),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}

/// Runs one user action on its own task so the UI keeps drawing while the
/// store answers.
fn spawn_action(list: Arc<TaskList>, prompt: ChannelPrompt, action: Action) {
    tokio::spawn(async move {
        let (name, result) = match &action {
            Action::Add => ("add", list.prompt_add(&prompt).await.map(|_| ())),
            Action::Edit(id) => ("edit", list.prompt_edit(&prompt, id).await.map(|_| ())),
            Action::Toggle(id) => ("toggle", list.toggle_and_notify(&prompt, id).await.map(|_| ())),
            Action::Delete(id) => ("delete", list.delete_and_notify(&prompt, id).await.map(|_| ())),
            Action::Reload => ("reload", list.reload_and_notify(&prompt).await.map(|_| ())),
            Action::None | Action::Quit => return,
        };
        if let Err(e) = result {
            tracing::warn!(action = name, error = %e, "action failed");
        }
    });
}

pub async fn run(cfg: AppConfig) -> Result<(), AppError> {
    let store = build_store(&cfg)?;
    let list = Arc::new(TaskList::new(store));
    let (prompt, ui_rx) = ChannelPrompt::new();

    let ticker = CountdownTicker::start(list.subscribe(), Duration::from_millis(cfg.ui.tick_ms));
    let mut app = App::new(list.subscribe(), ticker.subscribe(), list.store_name());
    spawn_action(list.clone(), prompt.clone(), Action::Reload);

    let mut terminal = setup_terminal()?;
    tracing::info!(store = list.store_name(), tick_ms = cfg.ui.tick_ms, "ui started");
    let result = event_loop(&mut terminal, &mut app, &list, &prompt, &ticker, ui_rx).await;

    app.close_forms();
    ticker.stop();
    restore_terminal(&mut terminal);
    tracing::info!("ui stopped");
    result
}

async fn event_loop(
    terminal: &mut Tui,
    app: &mut App,
    list: &Arc<TaskList>,
    prompt: &ChannelPrompt,
    ticker: &CountdownTicker,
    mut ui_rx: mpsc::UnboundedReceiver<UiRequest>,
) -> Result<(), AppError> {
    let (input_reader, mut input_rx) = InputReader::start();
    let mut tasks = list.subscribe();
    let mut countdowns = ticker.subscribe();

    let result = loop {
        if let Err(e) = terminal.draw(|f| ui::draw(f, app)) {
            break Err(AppError::Io(e));
        }

        tokio::select! {
            Some(request) = ui_rx.recv() => app.handle_ui_request(request),
            Some(key) = input_rx.recv() => match app.handle_key(key) {
                Action::Quit => break Ok(()),
                Action::None => {}
                action => spawn_action(list.clone(), prompt.clone(), action),
            },
            Ok(()) = countdowns.changed() => {}
            Ok(()) = tasks.changed() => {}
            else => break Ok(()),
        }
    };

    input_reader.stop();
    result
}
