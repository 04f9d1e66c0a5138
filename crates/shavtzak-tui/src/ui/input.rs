//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{
    can_add_email_char, can_add_password_char, can_add_text_char, App, AppState, FormField,
    LoginFocus, PromptKind, Tab, PAGE_SCROLL_SIZE,
};

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.state {
        AppState::LoggingIn => return handle_login_input(app, key).await,
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            return Ok(false);
        }
        AppState::ConfirmingQuit => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.state = AppState::Quitting;
                    return Ok(true);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::ConfirmingDiscard => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.state = AppState::Normal;
                    app.discard_changes();
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::Searching => {
            handle_search_input(app, key);
            return Ok(false);
        }
        AppState::EditingSoldier => {
            handle_form_input(app, key);
            return Ok(false);
        }
        AppState::Prompting(kind) => {
            handle_prompt_input(app, kind, key);
            return Ok(false);
        }
        AppState::Normal | AppState::Quitting => {}
    }

    // Global keys
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
            return Ok(false);
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
            return Ok(false);
        }
        KeyCode::Char(c @ '1'..='4') => {
            let index = c as usize - '1' as usize;
            app.current_tab = Tab::ALL[index];
            return Ok(false);
        }
        KeyCode::Left => {
            app.current_tab = app.current_tab.prev();
            return Ok(false);
        }
        KeyCode::Right => {
            app.current_tab = app.current_tab.next();
            return Ok(false);
        }
        KeyCode::Char('u') => {
            app.refresh_background();
            return Ok(false);
        }
        KeyCode::Char('L') if app.requires_login() => {
            app.logout();
            return Ok(false);
        }
        _ => {}
    }

    match app.current_tab {
        Tab::Roster => handle_roster_input(app, key),
        Tab::Equipment => handle_equipment_input(app, key),
        Tab::Users => handle_users_input(app, key),
        Tab::Report => handle_report_input(app, key),
    }

    Ok(false)
}

/// Move a list selection by `delta`, clamped to the list.
fn move_selection(selection: &mut usize, len: usize, delta: isize) {
    if len == 0 {
        *selection = 0;
        return;
    }
    let next = (*selection as isize + delta).clamp(0, len as isize - 1);
    *selection = next as usize;
}

fn navigation_delta(code: KeyCode) -> Option<isize> {
    match code {
        KeyCode::Up | KeyCode::Char('k') => Some(-1),
        KeyCode::Down | KeyCode::Char('j') => Some(1),
        KeyCode::PageUp => Some(-(PAGE_SCROLL_SIZE as isize)),
        KeyCode::PageDown => Some(PAGE_SCROLL_SIZE as isize),
        KeyCode::Home => Some(isize::MIN / 2),
        KeyCode::End => Some(isize::MAX / 2),
        _ => None,
    }
}

fn handle_roster_input(app: &mut App, key: KeyEvent) {
    if let Some(delta) = navigation_delta(key.code) {
        let len = app.visible_soldiers().len();
        move_selection(&mut app.roster_selection, len, delta);
        return;
    }

    match key.code {
        KeyCode::Char('/') => {
            app.state = AppState::Searching;
        }
        KeyCode::Esc => {
            app.roster.filter = Default::default();
            app.clamp_roster_selection();
        }
        KeyCode::Char(' ') => app.toggle_selected(),
        KeyCode::Char('a') => app.roster.select_all_filtered(true),
        KeyCode::Char('A') => app.roster.clear_selection(),
        KeyCode::Char('s') => app.cycle_status(),
        KeyCode::Char('c') => app.open_prompt(PromptKind::CustomStatus),
        KeyCode::Char('N') => app.open_prompt(PromptKind::Notes),
        KeyCode::Char('e') | KeyCode::Enter => app.start_edit_soldier(),
        KeyCode::Char('n') => app.start_add_soldier(),
        KeyCode::Char('x') | KeyCode::Delete => app.remove_selected_soldier(),
        KeyCode::Char('p') => {
            app.roster.cycle_platoon_filter();
            app.clamp_roster_selection();
        }
        KeyCode::Char('f') => {
            app.roster.cycle_status_filter();
            app.clamp_roster_selection();
        }
        KeyCode::Char('S') => app.sync_changes(),
        KeyCode::Char('D') => {
            if app.roster.has_changes() {
                app.state = AppState::ConfirmingDiscard;
            } else {
                app.status_message = Some("No changes to discard".to_string());
            }
        }
        _ => {}
    }
}

fn handle_search_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.roster.filter.search.clear();
            app.state = AppState::Normal;
        }
        KeyCode::Enter => {
            app.state = AppState::Normal;
        }
        KeyCode::Backspace => {
            app.roster.filter.search.pop();
        }
        KeyCode::Char(c) if can_add_text_char(app.roster.filter.search.chars().count(), c) => {
            app.roster.filter.search.push(c);
        }
        _ => {}
    }
    app.roster_selection = 0;
}

fn handle_form_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.state = AppState::Normal;
        }
        KeyCode::Enter => app.submit_form(),
        KeyCode::Tab | KeyCode::Down => app.form_field = app.form_field.next(),
        KeyCode::BackTab | KeyCode::Up => app.form_field = app.form_field.prev(),
        KeyCode::Left | KeyCode::Right | KeyCode::Char(' ')
            if app.form_field == FormField::Status =>
        {
            app.cycle_form_status();
        }
        KeyCode::Backspace => {
            if let Some(field) = app.form_field_mut() {
                field.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Some(field) = app.form_field_mut() {
                if can_add_text_char(field.chars().count(), c) {
                    field.push(c);
                }
            }
        }
        _ => {}
    }
}

fn handle_prompt_input(app: &mut App, kind: PromptKind, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.prompt_input.clear();
            app.state = AppState::Normal;
        }
        KeyCode::Enter => app.submit_prompt(kind),
        KeyCode::Backspace => {
            app.prompt_input.pop();
        }
        KeyCode::Char(c) if can_add_text_char(app.prompt_input.chars().count(), c) => {
            app.prompt_input.push(c);
        }
        _ => {}
    }
}

fn handle_equipment_input(app: &mut App, key: KeyEvent) {
    if let Some(delta) = navigation_delta(key.code) {
        let len = app.template_list.len();
        move_selection(&mut app.equipment_selection, len, delta);
        return;
    }
    match key.code {
        KeyCode::Char('n') => app.open_prompt(PromptKind::TemplateName),
        KeyCode::Char('i') | KeyCode::Enter => app.open_prompt(PromptKind::TemplateItem),
        KeyCode::Char('d') | KeyCode::Delete => app.delete_selected_template(),
        _ => {}
    }
}

fn handle_users_input(app: &mut App, key: KeyEvent) {
    if let Some(delta) = navigation_delta(key.code) {
        let len = app.user_list.len();
        move_selection(&mut app.users_selection, len, delta);
        return;
    }
    match key.code {
        KeyCode::Char('r') => app.cycle_selected_user_role(),
        KeyCode::Char(' ') => app.toggle_selected_user_active(),
        _ => {}
    }
}

fn handle_report_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('g') => {
            app.report_settings.group_by_platoon = !app.report_settings.group_by_platoon
        }
        KeyCode::Char('o') => app.report_settings.include_notes = !app.report_settings.include_notes,
        KeyCode::Char('h') => app.report_settings.include_home = !app.report_settings.include_home,
        KeyCode::Char('m') => app.email_report(),
        KeyCode::Char('w') => app.export_report(),
        KeyCode::Up | KeyCode::Char('k') => app.report_scroll = app.report_scroll.saturating_sub(1),
        KeyCode::Down | KeyCode::Char('j') => app.report_scroll = app.report_scroll.saturating_add(1),
        KeyCode::PageUp => {
            app.report_scroll = app.report_scroll.saturating_sub(PAGE_SCROLL_SIZE as u16)
        }
        KeyCode::PageDown => {
            app.report_scroll = app.report_scroll.saturating_add(PAGE_SCROLL_SIZE as u16)
        }
        _ => {}
    }
}

async fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            // Can't dismiss the login overlay without a session
            return Ok(false);
        }
        KeyCode::Tab | KeyCode::Down => {
            app.login_focus = match app.login_focus {
                LoginFocus::Email => LoginFocus::Password,
                LoginFocus::Password => LoginFocus::Button,
                LoginFocus::Button => LoginFocus::Email,
            };
        }
        KeyCode::BackTab | KeyCode::Up => {
            app.login_focus = match app.login_focus {
                LoginFocus::Email => LoginFocus::Button,
                LoginFocus::Password => LoginFocus::Email,
                LoginFocus::Button => LoginFocus::Password,
            };
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Email => app.login_focus = LoginFocus::Password,
            LoginFocus::Password | LoginFocus::Button => {
                if app.attempt_login().await.is_ok() && !app.load_from_cache() {
                    app.refresh_background();
                }
            }
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Email => {
                app.login_email.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Button => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Email => {
                if can_add_email_char(app.login_email.chars().count(), c) {
                    app.login_email.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_password.chars().count(), c) {
                    app.login_password.push(c);
                }
            }
            LoginFocus::Button => {}
        },
        _ => {}
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_selection_clamps() {
        let mut selection = 0;
        move_selection(&mut selection, 5, -1);
        assert_eq!(selection, 0);
        move_selection(&mut selection, 5, 3);
        assert_eq!(selection, 3);
        move_selection(&mut selection, 5, PAGE_SCROLL_SIZE as isize);
        assert_eq!(selection, 4);
        move_selection(&mut selection, 0, 1);
        assert_eq!(selection, 0);
    }

    #[test]
    fn test_home_and_end_jump() {
        let mut selection = 2;
        move_selection(&mut selection, 10, navigation_delta(KeyCode::End).unwrap());
        assert_eq!(selection, 9);
        move_selection(&mut selection, 10, navigation_delta(KeyCode::Home).unwrap());
        assert_eq!(selection, 0);
        assert_eq!(navigation_delta(KeyCode::Char('x')), None);
    }
}
