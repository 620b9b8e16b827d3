use crate::config::{Config, Keybindings, matches_key};
use crate::controller::{Effect, SelectionController};
use crate::models::{Company, MessageId};
use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::{Position, Rect};
use ratatui::style::Style;
use tui_textarea::TextArea;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum FocusedPanel {
    Folders,
    #[default]
    Messages,
    Details,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum UIMode {
    #[default]
    Browsing,
    Searching,
    PickingCompany,
    Tagging,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum TagFocus {
    #[default]
    Palette,
    Input,
}

fn single_line_input<'a>(placeholder: &str) -> TextArea<'a> {
    let mut input = TextArea::default();
    input.set_cursor_line_style(Style::default());
    input.set_placeholder_text(placeholder);
    input
}

pub struct TagOverlay<'a> {
    pub message_id: MessageId,
    pub focus: TagFocus,
    pub cursor: usize,
    pub input: TextArea<'a>,
}

pub struct CompanyPicker<'a> {
    pub input: TextArea<'a>,
    pub cursor: usize,
}

impl<'a> CompanyPicker<'a> {
    pub fn query(&self) -> String {
        self.input.lines().join("")
    }
}

pub struct App<'a> {
    pub controller: SelectionController,
    pub keybindings: Keybindings,
    pub mode: UIMode,
    pub focused_panel: FocusedPanel,
    pub search_input: TextArea<'a>,
    pub company_picker: Option<CompanyPicker<'a>>,
    pub tag_overlay: Option<TagOverlay<'a>>,
    pub detail_scroll: u16,
    pub should_quit: bool,
    /// Screen area of each rendered message row and its index in the visible list.
    pub message_hitboxes: Vec<(Rect, usize)>,
}

impl<'a> App<'a> {
    pub fn new(config: &Config) -> Self {
        Self {
            controller: SelectionController::new(config),
            keybindings: config.keybindings.clone(),
            mode: UIMode::Browsing,
            focused_panel: FocusedPanel::Messages,
            search_input: single_line_input("Search"),
            company_picker: None,
            tag_overlay: None,
            detail_scroll: 0,
            should_quit: false,
            message_hitboxes: Vec::new(),
        }
    }

    /// Position of the selected message within the filtered list.
    pub fn selected_visible_index(&self) -> Option<usize> {
        let selected = self.controller.emails().selected_id()?;
        self.controller
            .visible_messages()
            .iter()
            .position(|m| m.id == selected)
    }

    pub fn company_suggestions(&self) -> Vec<Company> {
        match &self.company_picker {
            Some(picker) => self.controller.directory().search(&picker.query()),
            None => Vec::new(),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, today: NaiveDate) -> Vec<Effect> {
        match self.mode {
            UIMode::Browsing => self.handle_browsing(key, today),
            UIMode::Searching => {
                self.handle_searching(key);
                Vec::new()
            }
            UIMode::PickingCompany => self.handle_company_picker(key),
            UIMode::Tagging => {
                self.handle_tagging(key);
                Vec::new()
            }
        }
    }

    /// A left click on a message row opens it, like pressing Enter on it.
    pub fn handle_mouse(&mut self, mouse: MouseEvent) -> Vec<Effect> {
        if self.mode != UIMode::Browsing
            || mouse.kind != MouseEventKind::Down(MouseButton::Left)
        {
            return Vec::new();
        }
        let hit = Position::new(mouse.column, mouse.row);
        let Some(index) = self
            .message_hitboxes
            .iter()
            .find(|(area, _)| area.contains(hit))
            .map(|(_, index)| *index)
        else {
            return Vec::new();
        };

        self.focused_panel = FocusedPanel::Messages;
        if Some(index) == self.selected_visible_index() {
            return Vec::new();
        }
        self.open_visible(index)
    }

    fn handle_browsing(&mut self, key: KeyEvent, today: NaiveDate) -> Vec<Effect> {
        let kb = &self.keybindings;

        if matches_key(key, &kb.quit) {
            self.should_quit = true;
        } else if matches_key(key, &kb.prev_panel) {
            self.focused_panel = match self.focused_panel {
                FocusedPanel::Details => FocusedPanel::Messages,
                FocusedPanel::Messages => FocusedPanel::Folders,
                FocusedPanel::Folders => FocusedPanel::Folders,
            };
        } else if matches_key(key, &kb.next_panel) {
            self.focused_panel = match self.focused_panel {
                FocusedPanel::Folders => FocusedPanel::Messages,
                FocusedPanel::Messages => FocusedPanel::Details,
                FocusedPanel::Details => FocusedPanel::Details,
            };
        } else if matches_key(key, &kb.move_down) {
            return self.move_cursor(1);
        } else if matches_key(key, &kb.move_up) {
            return self.move_cursor(-1);
        } else if matches_key(key, &kb.open) {
            if self.focused_panel == FocusedPanel::Messages {
                let index = self.selected_visible_index().unwrap_or(0);
                return self.open_visible(index);
            }
        } else if matches_key(key, &kb.search) {
            self.mode = UIMode::Searching;
            self.focused_panel = FocusedPanel::Messages;
        } else if matches_key(key, &kb.pick_company) {
            self.company_picker = Some(CompanyPicker {
                input: single_line_input("Search companies"),
                cursor: 0,
            });
            self.mode = UIMode::PickingCompany;
        } else if matches_key(key, &kb.clear_company) {
            return self.controller.clear_company();
        } else if matches_key(key, &kb.manage_tags) {
            if let Some(message) = self.controller.shown_message() {
                self.tag_overlay = Some(TagOverlay {
                    message_id: message.id,
                    focus: TagFocus::Palette,
                    cursor: 0,
                    input: single_line_input("Enter tag"),
                });
                self.mode = UIMode::Tagging;
            }
        } else if matches_key(key, &kb.process) {
            return self.controller.process_selected(today);
        }
        Vec::new()
    }

    fn move_cursor(&mut self, delta: isize) -> Vec<Effect> {
        match self.focused_panel {
            FocusedPanel::Folders => {
                let current = self.controller.folder_index();
                let last = self.controller.folders().len().saturating_sub(1);
                let next = current.saturating_add_signed(delta).min(last);
                self.detail_scroll = 0;
                self.controller.select_folder(next)
            }
            FocusedPanel::Messages => {
                let len = self.controller.visible_messages().len();
                if len == 0 {
                    return Vec::new();
                }
                let next = match self.selected_visible_index() {
                    Some(current) => current.saturating_add_signed(delta).min(len - 1),
                    None => 0,
                };
                if Some(next) == self.selected_visible_index() {
                    return Vec::new();
                }
                self.open_visible(next)
            }
            FocusedPanel::Details => {
                self.detail_scroll = self.detail_scroll.saturating_add_signed(delta as i16);
                Vec::new()
            }
        }
    }

    fn open_visible(&mut self, index: usize) -> Vec<Effect> {
        let Some(id) = self.controller.visible_messages().get(index).map(|m| m.id) else {
            return Vec::new();
        };
        self.detail_scroll = 0;
        self.controller.open_message(id)
    }

    fn handle_searching(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.mode = UIMode::Browsing,
            KeyCode::Esc => {
                self.search_input = single_line_input("Search");
                self.controller.set_search_text("");
                self.mode = UIMode::Browsing;
            }
            _ => {
                self.search_input.input(key);
                let text = self.search_input.lines().join("");
                self.controller.set_search_text(&text);
            }
        }
    }

    fn handle_company_picker(&mut self, key: KeyEvent) -> Vec<Effect> {
        let suggestions = self.company_suggestions();
        let Some(picker) = self.company_picker.as_mut() else {
            self.mode = UIMode::Browsing;
            return Vec::new();
        };

        match key.code {
            KeyCode::Esc => {
                self.company_picker = None;
                self.mode = UIMode::Browsing;
            }
            KeyCode::Down => {
                if picker.cursor + 1 < suggestions.len() {
                    picker.cursor += 1;
                }
            }
            KeyCode::Up => picker.cursor = picker.cursor.saturating_sub(1),
            KeyCode::Enter => {
                if let Some(company) = suggestions.get(picker.cursor).cloned() {
                    self.company_picker = None;
                    self.mode = UIMode::Browsing;
                    self.focused_panel = FocusedPanel::Messages;
                    return self.controller.select_company(company);
                }
            }
            _ => {
                picker.input.input(key);
                picker.cursor = 0;
            }
        }
        Vec::new()
    }

    fn handle_tagging(&mut self, key: KeyEvent) {
        let Some(overlay) = self.tag_overlay.as_mut() else {
            self.mode = UIMode::Browsing;
            return;
        };
        let tags = self.controller.tags_mut();

        match (overlay.focus, key.code) {
            (_, KeyCode::Esc) => {
                self.tag_overlay = None;
                self.mode = UIMode::Browsing;
            }
            (TagFocus::Palette, KeyCode::Tab) => overlay.focus = TagFocus::Input,
            (TagFocus::Input, KeyCode::Tab | KeyCode::BackTab) => {
                overlay.focus = TagFocus::Palette
            }
            (TagFocus::Palette, KeyCode::Down | KeyCode::Char('j')) => {
                if overlay.cursor + 1 < tags.palette().len() {
                    overlay.cursor += 1;
                }
            }
            (TagFocus::Palette, KeyCode::Up | KeyCode::Char('k')) => {
                overlay.cursor = overlay.cursor.saturating_sub(1)
            }
            (TagFocus::Palette, KeyCode::Enter | KeyCode::Char(' ')) => {
                if let Some(tag) = tags.palette().get(overlay.cursor).cloned() {
                    tags.toggle_tag(overlay.message_id, &tag);
                }
            }
            (TagFocus::Input, KeyCode::Enter) => {
                let tag = overlay.input.lines().join("");
                if tags.add_custom_tag(&tag) {
                    overlay.cursor = tags.palette().len() - 1;
                }
                overlay.input = single_line_input("Enter tag");
            }
            (TagFocus::Input, _) => {
                overlay.input.input(key);
            }
            _ => {}
        }
    }
}
