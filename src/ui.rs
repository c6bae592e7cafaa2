use chrono::{DateTime, Local, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use std::collections::VecDeque;
use tokio::sync::{oneshot, watch};

use crate::countdown::{parse_deadline, Countdown, CountdownMap, PENDING_TEXT};
use crate::prompt::{Notice, NoticeLevel, PromptRequest, UiRequest};
use crate::task::{Task, TaskInput, VisualState};

const DEADLINE_HINT: &str = "YYYY-MM-DDTHH:MM";

/// What a key press asks the run loop to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Add,
    Edit(String),
    Toggle(String),
    Delete(String),
    Reload,
}

/// Open task form; answering it consumes the reply.
pub struct Form {
    request: PromptRequest,
    fields: [String; 2],
    focus: usize,
    error: Option<String>,
    reply: Option<oneshot::Sender<Option<TaskInput>>>,
}

impl Form {
    fn new(request: PromptRequest, reply: oneshot::Sender<Option<TaskInput>>) -> Self {
        let fields = [request.initial.text.clone(), request.initial.deadline.clone()];
        Self {
            request,
            fields,
            focus: 0,
            error: None,
            reply: Some(reply),
        }
    }

    fn answer(&mut self, value: Option<TaskInput>) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(value);
        }
    }

    /// True once the form is answered.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => {
                self.answer(None);
                true
            }
            KeyCode::Enter => {
                let [text, deadline] = self.fields.clone();
                // Only datetimes leave the form, like a picker would.
                if !deadline.trim().is_empty() && parse_deadline(&deadline).is_none() {
                    self.error = Some(format!("Unrecognised deadline, use {}", DEADLINE_HINT));
                    self.focus = 1;
                    return false;
                }
                self.answer(Some(TaskInput::new(text, deadline)));
                true
            }
            KeyCode::Tab | KeyCode::Down | KeyCode::BackTab | KeyCode::Up => {
                self.focus = 1 - self.focus;
                false
            }
            KeyCode::Backspace => {
                self.fields[self.focus].pop();
                self.error = None;
                false
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.fields[self.focus].push(c);
                self.error = None;
                false
            }
            _ => false,
        }
    }
}

pub struct App {
    tasks: watch::Receiver<Vec<Task>>,
    countdowns: watch::Receiver<CountdownMap>,
    store_name: String,
    selected: usize,
    form: Option<Form>,
    queued_forms: VecDeque<Form>,
    notice: Option<Notice>,
}

impl App {
    pub fn new(
        tasks: watch::Receiver<Vec<Task>>,
        countdowns: watch::Receiver<CountdownMap>,
        store_name: impl Into<String>,
    ) -> Self {
        Self {
            tasks,
            countdowns,
            store_name: store_name.into(),
            selected: 0,
            form: None,
            queued_forms: VecDeque::new(),
            notice: None,
        }
    }

    pub fn handle_ui_request(&mut self, request: UiRequest) {
        match request {
            UiRequest::Form { request, reply } => {
                let form = Form::new(request, reply);
                if self.form.is_none() {
                    self.form = Some(form);
                } else {
                    self.queued_forms.push_back(form);
                }
            }
            UiRequest::Notice(notice) => self.notice = Some(notice),
        }
    }

    pub fn has_form(&self) -> bool {
        self.form.is_some()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    fn selected_id(&self) -> Option<String> {
        self.tasks.borrow().get(self.selected).map(|t| t.id.clone())
    }

    fn clamp_selection(&mut self) {
        let len = self.tasks.borrow().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        if let Some(form) = self.form.as_mut() {
            if form.handle_key(key) {
                self.form = self.queued_forms.pop_front();
            }
            return Action::None;
        }
        if self.notice.take().is_some() {
            return Action::None;
        }

        self.clamp_selection();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
            KeyCode::Char('a') => Action::Add,
            KeyCode::Char('r') => Action::Reload,
            KeyCode::Char('e') => self.selected_id().map_or(Action::None, Action::Edit),
            KeyCode::Char('d') | KeyCode::Delete => {
                self.selected_id().map_or(Action::None, Action::Delete)
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                self.selected_id().map_or(Action::None, Action::Toggle)
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
                Action::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let len = self.tasks.borrow().len();
                if self.selected + 1 < len {
                    self.selected += 1;
                }
                Action::None
            }
            _ => Action::None,
        }
    }

    /// Cancels every open and queued form.
    pub fn close_forms(&mut self) {
        if let Some(mut form) = self.form.take() {
            form.answer(None);
        }
        for mut form in self.queued_forms.drain(..) {
            form.answer(None);
        }
    }
}

fn state_color(state: VisualState) -> Color {
    match state {
        VisualState::Completed => Color::Green,
        VisualState::Expired => Color::Red,
        VisualState::Active => Color::Yellow,
    }
}

fn format_deadline(raw: &str) -> String {
    match parse_deadline(raw) {
        Some(at) => at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        None => raw.to_string(),
    }
}

/// Before a task's first tick the state comes from a countdown computed on
/// the spot; only the text waits for the ticker.
fn display_state(task: &Task, countdown: Option<&Countdown>, now: DateTime<Utc>) -> VisualState {
    match countdown {
        Some(countdown) => task.visual_state(countdown),
        None => task.visual_state(&Countdown::for_deadline(&task.deadline, now)),
    }
}

fn task_item<'a>(task: &'a Task, countdown: Option<&Countdown>, now: DateTime<Utc>) -> ListItem<'a> {
    let state = display_state(task, countdown, now);
    let color = state_color(state);
    let marker = Span::styled("▌ ", Style::default().fg(color));

    let text_style = if task.completed {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT)
    } else {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    };
    let countdown_text = countdown.map_or_else(|| PENDING_TEXT.to_string(), |c| c.to_string());
    let countdown_style = if state == VisualState::Expired {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };

    ListItem::new(vec![
        Line::from(vec![marker.clone(), Span::styled(task.text.as_str(), text_style)]),
        Line::from(vec![
            marker.clone(),
            Span::raw(format!("Deadline: {}", format_deadline(&task.deadline))),
        ]),
        Line::from(vec![marker, Span::styled(countdown_text, countdown_style)]),
    ])
}

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(
                "To-Do List",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("  [{}]", app.store_name)),
        ])),
        chunks[0],
    );

    let now = Utc::now();
    let tasks = app.tasks.borrow();
    let countdowns = app.countdowns.borrow();
    let items: Vec<ListItem> = tasks
        .iter()
        .map(|t| task_item(t, countdowns.get(&t.id), now))
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .title(format!("Tasks ({})", tasks.len()))
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    let mut state = ListState::default();
    if !tasks.is_empty() {
        state.select(Some(app.selected.min(tasks.len() - 1)));
    }
    f.render_stateful_widget(list, chunks[1], &mut state);

    f.render_widget(
        Paragraph::new("a add  e edit  space toggle  d delete  r reload  q quit")
            .style(Style::default().fg(Color::DarkGray)),
        chunks[2],
    );

    if let Some(form) = &app.form {
        draw_form(f, form);
    } else if let Some(notice) = &app.notice {
        draw_notice(f, notice);
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let [row] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [cell] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(row);
    cell
}

fn draw_form(f: &mut Frame, form: &Form) {
    let area = centered(f.area(), 60, 8);
    f.render_widget(Clear, area);

    let field = |idx: usize, label: &str, placeholder: &str| {
        let value = &form.fields[idx];
        let style = if form.focus == idx {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let shown = if value.is_empty() && form.focus != idx {
            Span::styled(placeholder.to_string(), Style::default().fg(Color::DarkGray))
        } else {
            Span::styled(format!("{}_", value), style)
        };
        Line::from(vec![Span::styled(format!("{:<10}", label), style), shown])
    };

    let body = vec![
        field(0, "Task", "Task name"),
        field(1, "Deadline", DEADLINE_HINT),
        match &form.error {
            Some(error) => Line::styled(error.clone(), Style::default().fg(Color::Red)),
            None => Line::raw(""),
        },
        Line::styled(
            format!(
                "[Enter] {}  [Esc] Cancel  [Tab] next field",
                form.request.confirm_label
            ),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    f.render_widget(
        Paragraph::new(body).block(
            Block::default()
                .title(form.request.title.as_str())
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::Cyan)),
        ),
        area,
    );
}

fn draw_notice(f: &mut Frame, notice: &Notice) {
    let area = centered(f.area(), 50, 6);
    f.render_widget(Clear, area);
    let color = match notice.level {
        NoticeLevel::Success => Color::Green,
        NoticeLevel::Error => Color::Red,
    };
    f.render_widget(
        Paragraph::new(vec![
            Line::raw(notice.message.as_str()),
            Line::raw(""),
            Line::styled("press any key", Style::default().fg(Color::DarkGray)),
        ])
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title(notice.title.as_str())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        ),
        area,
    );
}
