//! Key bindings.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::session::{Focus, Intent, Screen, Session};

/// Translate a key press into an intent for the current screen.
///
/// Returns `None` for keys with no binding.
#[must_use]
pub fn map_key(session: &Session, key: KeyEvent) -> Option<Intent> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Intent::Quit),
            KeyCode::Char('r') => Some(Intent::Refresh),
            _ => None,
        };
    }
    if session.is_text_entry() {
        return text_entry(session.screen(), key.code);
    }

    let screen = session.screen();
    match key.code {
        KeyCode::Esc => return Some(Intent::Back),
        KeyCode::Char('r') => return Some(Intent::Refresh),
        _ => {}
    }

    match screen {
        Screen::ApplicationList => application_list(session.focus(), key.code),
        Screen::ApplicationDetail => match key.code {
            KeyCode::Char('q') => Some(Intent::Quit),
            KeyCode::Backspace => Some(Intent::Back),
            KeyCode::Up | KeyCode::Char('k') => Some(Intent::MoveSelection(-1)),
            KeyCode::Down | KeyCode::Char('j') => Some(Intent::MoveSelection(1)),
            KeyCode::Enter => Some(Intent::Open),
            _ => None,
        },
        Screen::FindingsList => match key.code {
            KeyCode::Char('q') => Some(Intent::Quit),
            KeyCode::Backspace => Some(Intent::Back),
            KeyCode::Up | KeyCode::Char('k') => Some(Intent::MoveSelection(-1)),
            KeyCode::Down | KeyCode::Char('j') => Some(Intent::MoveSelection(1)),
            KeyCode::PageDown => Some(Intent::NextPage),
            KeyCode::PageUp => Some(Intent::PreviousPage),
            KeyCode::Char('t') => Some(Intent::CycleFindingScanType),
            KeyCode::Char('v') => Some(Intent::CycleSeverity),
            KeyCode::Char('p') => Some(Intent::CyclePolicy),
            KeyCode::Enter => Some(Intent::Open),
            _ => None,
        },
        Screen::FindingDetail => match key.code {
            KeyCode::Char('q') => Some(Intent::Quit),
            KeyCode::Backspace => Some(Intent::Back),
            KeyCode::Char('d') | KeyCode::Enter => Some(Intent::ShowDataPaths),
            KeyCode::Char('c') => Some(Intent::Annotate),
            _ => None,
        },
        Screen::DataPaths => match key.code {
            KeyCode::Char('q') => Some(Intent::Quit),
            KeyCode::Backspace => Some(Intent::Back),
            KeyCode::Left | KeyCode::Up | KeyCode::Char('h') | KeyCode::Char('k') => {
                Some(Intent::StepDataPath(-1))
            }
            KeyCode::Right | KeyCode::Down | KeyCode::Char('l') | KeyCode::Char('j') => {
                Some(Intent::StepDataPath(1))
            }
            _ => None,
        },
        // Always a text entry screen
        Screen::AnnotationForm => None,
    }
}

fn application_list(focus: Focus, code: KeyCode) -> Option<Intent> {
    match code {
        KeyCode::Char('q') if focus == Focus::Table => Some(Intent::Quit),
        KeyCode::Char('n') => Some(Intent::Focus(Focus::Name)),
        KeyCode::Char('s') => Some(Intent::Focus(Focus::ScanStatus)),
        KeyCode::Char('t') => Some(Intent::Focus(Focus::ScanType)),
        KeyCode::Char('m') => Some(Intent::Focus(Focus::ModifiedAfter)),
        KeyCode::Char('a') => Some(Intent::Focus(Focus::Table)),
        KeyCode::Tab => Some(Intent::FocusNext),
        KeyCode::BackTab => Some(Intent::FocusPrevious),
        KeyCode::Up | KeyCode::Char('k') => Some(Intent::MoveSelection(-1)),
        KeyCode::Down | KeyCode::Char('j') => Some(Intent::MoveSelection(1)),
        KeyCode::Left => Some(Intent::CycleOption(-1)),
        KeyCode::Right => Some(Intent::CycleOption(1)),
        KeyCode::PageDown => Some(Intent::NextPage),
        KeyCode::PageUp => Some(Intent::PreviousPage),
        KeyCode::Enter => Some(Intent::Submit),
        _ => None,
    }
}

fn text_entry(screen: Screen, code: KeyCode) -> Option<Intent> {
    match code {
        KeyCode::Esc => Some(Intent::Back),
        KeyCode::Enter => Some(Intent::Submit),
        KeyCode::Backspace => Some(Intent::DeleteChar),
        KeyCode::Tab if screen == Screen::ApplicationList => Some(Intent::FocusNext),
        KeyCode::BackTab if screen == Screen::ApplicationList => Some(Intent::FocusPrevious),
        KeyCode::Left if screen == Screen::AnnotationForm => Some(Intent::CycleOption(-1)),
        KeyCode::Right if screen == Screen::AnnotationForm => Some(Intent::CycleOption(1)),
        KeyCode::Char(c) => Some(Intent::Input(c)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_q_quits_from_table() {
        let session = Session::new(100);
        assert_eq!(map_key(&session, key(KeyCode::Char('q'))), Some(Intent::Quit));
        assert_eq!(
            map_key(&session, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Intent::Quit)
        );
    }

    #[test]
    fn test_letters_are_typed_in_text_fields() {
        let mut session = Session::new(100);
        session.handle(Intent::Focus(Focus::Name));
        assert_eq!(
            map_key(&session, key(KeyCode::Char('q'))),
            Some(Intent::Input('q'))
        );
        assert_eq!(map_key(&session, key(KeyCode::Tab)), Some(Intent::FocusNext));
        assert_eq!(map_key(&session, key(KeyCode::Esc)), Some(Intent::Back));
    }

    #[test]
    fn test_focus_keys() {
        let session = Session::new(100);
        assert_eq!(
            map_key(&session, key(KeyCode::Char('m'))),
            Some(Intent::Focus(Focus::ModifiedAfter))
        );
        assert_eq!(map_key(&session, key(KeyCode::PageDown)), Some(Intent::NextPage));
        assert_eq!(map_key(&session, key(KeyCode::F(5))), None);
    }
}
