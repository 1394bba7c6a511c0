use std::io::{self, Stdout};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::{wrap, Options as WrapOptions};

use crate::api::{PostId, User};
use crate::builders::{HIDE_CLASS, POST_ID_KEY};
use crate::data::Directory;
use crate::dom::{Element, Node};
use crate::lifecycle::{fetch_cycle, ChangeEvent, CommitOutcome, CycleResult};
use crate::page::Page;

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const COMMENT_PREFIX: &str = "  │ ";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Pane {
    Employees,
    Posts,
}

impl Pane {
    fn title(&self) -> &'static str {
        match self {
            Pane::Employees => "Employees",
            Pane::Posts => "Posts",
        }
    }

    fn other(&self) -> Self {
        match self {
            Pane::Employees => Pane::Posts,
            Pane::Posts => Pane::Employees,
        }
    }
}

enum AsyncResponse {
    Users {
        result: Option<Vec<User>>,
    },
    Refresh {
        generation: u64,
        result: CycleResult,
    },
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

/// Rendered `main` region plus the first line of each post's article.
struct MainLines {
    lines: Vec<Line<'static>>,
    post_starts: Vec<(PostId, usize)>,
}

fn wrap_with_prefix(text: &str, width: usize, prefix: &str, style: Style) -> Vec<Line<'static>> {
    let available = width.saturating_sub(prefix.chars().count()).max(8);
    wrap(text, WrapOptions::new(available))
        .into_iter()
        .map(|segment| {
            Line::from(vec![
                Span::styled(prefix.to_string(), Style::default().fg(COLOR_BORDER_IDLE)),
                Span::styled(segment.into_owned(), style),
            ])
        })
        .collect()
}

fn render_comment(article: &Element, width: usize, lines: &mut Vec<Line<'static>>) {
    for child in article.element_children() {
        let style = match child.tag() {
            "h3" => Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD),
            _ => Style::default().fg(COLOR_TEXT_SECONDARY),
        };
        lines.extend(wrap_with_prefix(
            &child.text_content(),
            width,
            COMMENT_PREFIX,
            style,
        ));
    }
    lines.push(Line::from(Span::styled(
        COMMENT_PREFIX.to_string(),
        Style::default().fg(COLOR_BORDER_IDLE),
    )));
}

fn render_article(
    article: &Element,
    width: usize,
    selected: bool,
    lines: &mut Vec<Line<'static>>,
) {
    for child in article.element_children() {
        match child.tag() {
            "h2" => lines.extend(wrap_with_prefix(
                &child.text_content(),
                width,
                "",
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .add_modifier(Modifier::BOLD),
            )),
            "button" => {
                let mut style = Style::default().fg(COLOR_ACCENT);
                if selected {
                    style = style
                        .bg(COLOR_PANEL_SELECTED_BG)
                        .add_modifier(Modifier::BOLD);
                }
                lines.push(Line::from(Span::styled(
                    format!("[ {} ]", child.text_content()),
                    style,
                )));
            }
            "section" => {
                if child.has_class(HIDE_CLASS) {
                    continue;
                }
                let mut any = false;
                for comment in child.element_children() {
                    render_comment(comment, width, lines);
                    any = true;
                }
                if !any {
                    lines.extend(wrap_with_prefix(
                        "No comments yet.",
                        width,
                        COMMENT_PREFIX,
                        Style::default()
                            .fg(COLOR_TEXT_SECONDARY)
                            .add_modifier(Modifier::ITALIC),
                    ));
                }
            }
            _ => lines.extend(wrap_with_prefix(
                &child.text_content(),
                width,
                "",
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )),
        }
    }
}

/// Scroll offset that keeps `line` inside a viewport of `height` rows.
fn scroll_to_line(scroll: u16, height: u16, line: usize) -> u16 {
    let line = u16::try_from(line).unwrap_or(u16::MAX);
    if line < scroll || line >= scroll.saturating_add(height.max(1)) {
        line
    } else {
        scroll
    }
}

fn render_main(main: &Element, width: usize, selected_post: Option<PostId>) -> MainLines {
    let mut lines = Vec::new();
    let mut post_starts = Vec::new();

    for node in main.children() {
        let element = match node {
            Node::Element(element) => element,
            Node::Text(text) => {
                lines.extend(wrap_with_prefix(text, width, "", Style::default()));
                continue;
            }
        };
        match element.tag() {
            "article" => {
                let post_id = element
                    .descendants_by_tag("button")
                    .first()
                    .and_then(|button| button.data(POST_ID_KEY))
                    .and_then(|raw| raw.parse::<PostId>().ok());
                if let Some(post_id) = post_id {
                    post_starts.push((post_id, lines.len()));
                }
                let selected = post_id.is_some() && post_id == selected_post;
                render_article(element, width, selected, &mut lines);
                lines.push(Line::default());
            }
            _ => lines.extend(wrap_with_prefix(
                &element.text_content(),
                width,
                "",
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            )),
        }
    }

    MainLines { lines, post_starts }
}

pub struct Options {
    pub directory: Directory,
    pub fallback_user_id: u64,
    pub status_message: String,
}

pub struct Model {
    page: Page,
    directory: Directory,
    status_message: String,
    focused_pane: Pane,
    employee_index: usize,
    post_index: usize,
    content_scroll: u16,
    users_loading: bool,
    needs_redraw: bool,
    spinner: Spinner,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
}

impl Model {
    pub fn new(options: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            page: Page::new(options.fallback_user_id),
            directory: options.directory,
            status_message: options.status_message,
            focused_pane: Pane::Employees,
            employee_index: 0,
            post_index: 0,
            content_scroll: 0,
            users_loading: false,
            needs_redraw: true,
            spinner: Spinner::new(),
            response_tx,
            response_rx,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        self.init_page();
        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn is_loading(&self) -> bool {
        self.users_loading || self.page.is_refreshing()
    }

    fn init_page(&mut self) {
        self.users_loading = true;
        self.status_message = "Loading employees...".to_string();
        let tx = self.response_tx.clone();
        let directory = self.directory.clone();
        thread::spawn(move || {
            let result = directory.get_users();
            let _ = tx.send(AsyncResponse::Users { result });
        });
    }

    fn start_refresh(&mut self, event: ChangeEvent) {
        let ticket = self.page.begin_refresh(&event);
        self.status_message = format!("Loading posts for employee {}...", ticket.user_id);
        self.spinner.reset();

        let tx = self.response_tx.clone();
        let directory = self.directory.clone();
        thread::spawn(move || {
            let result = fetch_cycle(&directory, ticket.user_id, &ticket.cancel);
            let _ = tx.send(AsyncResponse::Refresh {
                generation: ticket.generation,
                result,
            });
        });
        self.mark_dirty();
    }

    fn poll_async(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message);
            changed = true;
        }
        changed
    }

    fn handle_async_response(&mut self, message: AsyncResponse) {
        match message {
            AsyncResponse::Users { result } => {
                self.users_loading = false;
                let added = self.page.populate_select_menu(result.as_deref());
                self.status_message = if result.is_some() {
                    format!("{added} employees. Press Enter to load their posts.")
                } else {
                    "Failed to load employees. See the log for details.".to_string()
                };
            }
            AsyncResponse::Refresh { generation, result } => {
                match self.page.commit_refresh(generation, result) {
                    CommitOutcome::Rendered { posts, .. } => {
                        self.status_message = format!("Showing {posts} posts.");
                    }
                    CommitOutcome::Empty => {
                        self.status_message = "No posts for this employee.".to_string();
                    }
                    CommitOutcome::Failed(err) => {
                        self.status_message = format!("Failed to load posts: {err}");
                    }
                    CommitOutcome::Stale { .. } => return,
                }
                self.post_index = 0;
                self.content_scroll = 0;
            }
        }
        self.mark_dirty();
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && self.handle_key(key.code) {
                        break;
                    }
                }
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.is_loading() && self.spinner.advance() {
                    self.mark_dirty();
                } else if !self.is_loading() {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    /// Returns `true` when the app should exit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Tab
            | KeyCode::BackTab
            | KeyCode::Char('h')
            | KeyCode::Char('l')
            | KeyCode::Left
            | KeyCode::Right => {
                self.focused_pane = self.focused_pane.other();
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Enter => match self.focused_pane {
                Pane::Employees => self.select_employee(),
                Pane::Posts => self.click_selected_post(),
            },
            KeyCode::Char('c') => self.click_selected_post(),
            KeyCode::Char('r') => {
                if self.page.is_select_disabled() {
                    self.status_message = "Still loading, please wait.".to_string();
                } else {
                    let value = self.page.selected_user_id().map(|id| id.to_string());
                    self.start_refresh(ChangeEvent { value });
                }
            }
            _ => return false,
        }
        self.mark_dirty();
        false
    }

    fn move_selection(&mut self, delta: isize) {
        let (index, len) = match self.focused_pane {
            Pane::Employees => (&mut self.employee_index, self.page.options().len()),
            Pane::Posts => (&mut self.post_index, self.page.rendered_posts().len()),
        };
        if len == 0 {
            *index = 0;
            return;
        }
        let next = (*index as isize + delta).clamp(0, len as isize - 1);
        *index = next as usize;
    }

    fn select_employee(&mut self) {
        if self.page.is_select_disabled() {
            self.status_message = "Still loading, please wait.".to_string();
            return;
        }
        let value = self
            .page
            .options()
            .get(self.employee_index)
            .map(|(value, _)| value.clone());
        self.start_refresh(ChangeEvent { value });
    }

    fn selected_post(&self) -> Option<PostId> {
        self.page.rendered_posts().get(self.post_index).copied()
    }

    fn click_selected_post(&mut self) {
        if let Some(post_id) = self.selected_post() {
            self.page.click(post_id);
        }
    }

    fn pane_block(&self, pane: Pane) -> Block<'static> {
        let focused = self.focused_pane == pane;
        let border_style = if focused {
            Style::default().fg(COLOR_BORDER_FOCUSED)
        } else {
            Style::default().fg(COLOR_BORDER_IDLE)
        };
        let title_style = if focused {
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(COLOR_TEXT_SECONDARY)
        };
        Block::default()
            .title(Span::styled(pane.title(), title_style))
            .borders(Borders::ALL)
            .border_style(border_style)
            .style(Style::default().bg(COLOR_PANEL_BG))
            .padding(Padding::uniform(1))
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_text = if self.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
        } else {
            self.status_message.clone()
        };
        let status_line = Paragraph::new(status_text).style(
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, layout[0]);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(28), Constraint::Percentage(72)])
            .split(layout[1]);
        self.draw_employees(frame, columns[0]);
        self.draw_posts(frame, columns[1]);

        let footer = Paragraph::new(
            "j/k move · Enter select/toggle · Tab switch pane · r reload · q quit",
        )
        .style(
            Style::default()
                .fg(COLOR_TEXT_SECONDARY)
                .bg(COLOR_PANEL_BG)
                .add_modifier(Modifier::ITALIC),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[2]);
    }

    fn draw_employees(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block(Pane::Employees);
        let disabled = self.page.is_select_disabled();
        let selected_user = self.page.selected_user_id().map(|id| id.to_string());

        let items: Vec<ListItem> = self
            .page
            .options()
            .into_iter()
            .map(|(value, label)| {
                let active = selected_user.as_deref() == Some(value.as_str());
                let marker = if active { "●" } else { "○" };
                let color = if disabled {
                    COLOR_BORDER_IDLE
                } else if active {
                    COLOR_SUCCESS
                } else {
                    COLOR_TEXT_PRIMARY
                };
                ListItem::new(Line::from(Span::styled(
                    format!("{marker} {label}"),
                    Style::default().fg(color),
                )))
            })
            .collect();

        if items.is_empty() {
            let message = if self.users_loading {
                "Loading employees..."
            } else {
                "No employees available."
            };
            let color = if self.users_loading {
                COLOR_TEXT_SECONDARY
            } else {
                COLOR_ERROR
            };
            frame.render_widget(
                Paragraph::new(message)
                    .style(Style::default().fg(color))
                    .block(block),
                area,
            );
            return;
        }

        let mut state = ListState::default();
        state.select(Some(self.employee_index));
        let highlight = if self.focused_pane == Pane::Employees {
            Style::default()
                .bg(COLOR_PANEL_SELECTED_BG)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let list = List::new(items).block(block).highlight_style(highlight);
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_posts(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block(Pane::Posts);
        let inner = block.inner(area);
        let width = inner.width.max(1) as usize;
        let selected = if self.focused_pane == Pane::Posts {
            self.selected_post()
        } else {
            None
        };
        let rendered = render_main(&self.page.document().main, width, selected);

        if let Some(start) = selected.and_then(|id| {
            rendered
                .post_starts
                .iter()
                .find(|(post_id, _)| *post_id == id)
                .map(|(_, start)| *start)
        }) {
            self.content_scroll = scroll_to_line(self.content_scroll, inner.height, start);
        }

        let paragraph = Paragraph::new(Text::from(rendered.lines))
            .block(block)
            .scroll((self.content_scroll, 0));
        frame.render_widget(paragraph, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use crate::api::{Company, Post};
    use crate::builders::{
        build_comment_section, build_placeholder, build_toggle_button, PLACEHOLDER_TEXT,
    };
    use crate::data::MockDirectorySource;
    use crate::toggle::Visibility;

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    fn article(post_id: PostId) -> Element {
        let mut article = Element::new("article");
        let mut title = Element::new("h2");
        title.set_text_content(format!("post {post_id}"));
        article.append(title);
        article.append(build_toggle_button(post_id));
        article.append(build_comment_section(post_id, &[]));
        article
    }

    #[test]
    fn placeholder_renders_as_single_line() {
        let mut main = Element::new("main");
        main.append(build_placeholder());
        let rendered = render_main(&main, 80, None);
        assert_eq!(rendered.lines.len(), 1);
        assert!(line_text(&rendered.lines[0]).contains("Select an Employee"));
        assert!(rendered.post_starts.is_empty());
    }

    #[test]
    fn hidden_sections_are_not_rendered() {
        let mut main = Element::new("main");
        main.append(article(3));
        main.append(article(4));
        let rendered = render_main(&main, 80, Some(4));
        let text: Vec<String> = rendered.lines.iter().map(line_text).collect();
        assert!(text.iter().all(|line| !line.contains("No comments yet.")));
        assert_eq!(rendered.post_starts, vec![(3, 0), (4, 3)]);
        assert!(text.contains(&"[ Show Comments ]".to_string()));
    }

    #[test]
    fn shown_section_renders_empty_notice() {
        let mut main = Element::new("main");
        let mut open = article(3);
        open.find_by_data_mut("section", POST_ID_KEY, "3")
            .unwrap()
            .remove_class(HIDE_CLASS);
        main.append(open);
        let rendered = render_main(&main, 80, None);
        let text: Vec<String> = rendered.lines.iter().map(line_text).collect();
        assert!(text.iter().any(|line| line.contains("No comments yet.")));
        assert_eq!(Visibility::Shown.button_label(), "Hide Comments");
    }

    fn model() -> Model {
        let source = Arc::new(
            MockDirectorySource::new()
                .with_user(User {
                    id: 5,
                    name: "Chelsey Dietrich".into(),
                    username: "Kamren".into(),
                    email: "Lucio_Hettinger@annie.ca".into(),
                    company: Company {
                        name: "Keebler LLC".into(),
                        catch_phrase: "User-centric fault-tolerant solution".into(),
                    },
                })
                .with_post(Post {
                    id: 41,
                    user_id: 5,
                    title: "non est facere".into(),
                    body: "molestias id nostrum".into(),
                }),
        );
        Model::new(Options {
            directory: Directory::new(source),
            fallback_user_id: 1,
            status_message: String::new(),
        })
    }

    #[test]
    fn stale_refresh_response_is_dropped() {
        let mut model = model();
        let first = model.page.begin_refresh(&ChangeEvent::new("3"));
        let second = model.page.begin_refresh(&ChangeEvent::new("5"));
        assert!(first.cancel.load(Ordering::SeqCst));
        model.status_message = "Loading posts for employee 5...".to_string();
        model.post_index = 2;

        model.handle_async_response(AsyncResponse::Refresh {
            generation: first.generation,
            result: Ok(Vec::new()),
        });
        assert_eq!(model.status_message, "Loading posts for employee 5...");
        assert_eq!(model.post_index, 2);
        assert!(model.page.is_refreshing());
        assert!(model.page.is_select_disabled());
        assert_eq!(model.page.document().main.text_content(), PLACEHOLDER_TEXT);

        let result = fetch_cycle(&model.directory, second.user_id, &second.cancel);
        model.handle_async_response(AsyncResponse::Refresh {
            generation: second.generation,
            result,
        });
        assert_eq!(model.status_message, "Showing 1 posts.");
        assert_eq!(model.post_index, 0);
        assert!(!model.page.is_refreshing());
        assert!(!model.page.is_select_disabled());
        assert_eq!(model.page.rendered_posts(), vec![41]);
    }

    #[test]
    fn scroll_follows_selected_post() {
        assert_eq!(scroll_to_line(0, 10, 4), 0);
        assert_eq!(scroll_to_line(0, 10, 12), 12);
        assert_eq!(scroll_to_line(12, 10, 3), 3);
        assert_eq!(scroll_to_line(0, 10, 70_000), u16::MAX);
    }

    #[test]
    fn wrap_respects_prefix_width() {
        let lines = wrap_with_prefix("alpha beta gamma delta", 14, "  │ ", Style::default());
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line_text(line).chars().count() <= 14);
        }
    }
}
