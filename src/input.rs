use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::model::Screen;

/// Key-routing mode. Mostly mirrors the active screen, except that an open
/// container prompt captures all keys.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InputMode {
    Namespaces,
    Pods,
    Console,
    Picker,
    Exec,
}

impl InputMode {
    pub fn for_screen(screen: Screen, picker_open: bool) -> Self {
        if picker_open {
            return Self::Picker;
        }
        match screen {
            Screen::Namespaces => Self::Namespaces,
            Screen::Pods => Self::Pods,
            Screen::Console => Self::Console,
            Screen::Exec => Self::Exec,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    Up,
    Down,
    PageUp,
    PageDown,
    Top,
    Bottom,
    Reload,
    ShowNamespaces,
    ShowPods,
    ShowConsole,
    CycleFocus,
    Select,
    TailLogs,
    OpenExec,
    CancelPrompt,
    ExecInput(Vec<u8>),
}

pub fn map_key(mode: InputMode, key: KeyEvent) -> Option<Action> {
    match mode {
        InputMode::Namespaces => map_namespaces_key(key),
        InputMode::Pods => map_pods_key(key),
        InputMode::Console => map_console_key(key),
        InputMode::Picker => map_picker_key(key),
        InputMode::Exec => encode_exec_key(key).map(Action::ExecInput),
    }
}

fn map_common_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Up => Some(Action::Up),
        KeyCode::Down => Some(Action::Down),
        KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::Home => Some(Action::Top),
        KeyCode::End => Some(Action::Bottom),
        _ => None,
    }
}

fn map_namespaces_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('r') => Some(Action::Reload),
        KeyCode::Char('p') => Some(Action::ShowPods),
        KeyCode::Char('c') if key.modifiers.is_empty() => Some(Action::ShowConsole),
        KeyCode::Enter => Some(Action::Select),
        _ => map_common_key(key),
    }
}

fn map_pods_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('r') => Some(Action::Reload),
        KeyCode::Char('n') => Some(Action::ShowNamespaces),
        KeyCode::Char('c') if key.modifiers.is_empty() => Some(Action::ShowConsole),
        KeyCode::Char('t') => Some(Action::TailLogs),
        KeyCode::Char('e') => Some(Action::OpenExec),
        KeyCode::Tab => Some(Action::CycleFocus),
        KeyCode::Enter => Some(Action::Select),
        _ => map_common_key(key),
    }
}

fn map_console_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('n') => Some(Action::ShowNamespaces),
        KeyCode::Char('p') => Some(Action::ShowPods),
        _ => map_common_key(key),
    }
}

fn map_picker_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Enter => Some(Action::Select),
        KeyCode::Esc => Some(Action::CancelPrompt),
        _ => map_common_key(key),
    }
}

/// Encodes a key event into the bytes a terminal would emit, so every
/// keystroke reaches the remote shell verbatim.
pub fn encode_exec_key(key: KeyEvent) -> Option<Vec<u8>> {
    let bytes = match key.code {
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                let byte = (c.to_ascii_lowercase() as u8).wrapping_sub(b'a' - 1);
                vec![byte]
            } else if key.modifiers.contains(KeyModifiers::ALT) {
                let mut buf = vec![0x1b];
                buf.extend(c.to_string().into_bytes());
                buf
            } else {
                c.to_string().into_bytes()
            }
        }
        KeyCode::Enter => vec![b'\r'],
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Tab => vec![b'\t'],
        KeyCode::Esc => vec![0x1b],
        KeyCode::Up => b"\x1b[A".to_vec(),
        KeyCode::Down => b"\x1b[B".to_vec(),
        KeyCode::Right => b"\x1b[C".to_vec(),
        KeyCode::Left => b"\x1b[D".to_vec(),
        KeyCode::Home => b"\x1b[H".to_vec(),
        KeyCode::End => b"\x1b[F".to_vec(),
        KeyCode::PageUp => b"\x1b[5~".to_vec(),
        KeyCode::PageDown => b"\x1b[6~".to_vec(),
        KeyCode::Delete => b"\x1b[3~".to_vec(),
        _ => return None,
    };
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::{Action, InputMode, encode_exec_key, map_key};
    use crate::model::Screen;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    #[test]
    fn namespaces_mode_maps_quit_and_select() {
        let quit = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        assert_eq!(map_key(InputMode::Namespaces, quit), Some(Action::Quit));

        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(map_key(InputMode::Namespaces, enter), Some(Action::Select));
    }

    #[test]
    fn pods_mode_maps_stream_keys() {
        let tail = KeyEvent::new(KeyCode::Char('t'), KeyModifiers::NONE);
        assert_eq!(map_key(InputMode::Pods, tail), Some(Action::TailLogs));

        let exec = KeyEvent::new(KeyCode::Char('e'), KeyModifiers::NONE);
        assert_eq!(map_key(InputMode::Pods, exec), Some(Action::OpenExec));

        let tab = KeyEvent::new(KeyCode::Tab, KeyModifiers::NONE);
        assert_eq!(map_key(InputMode::Pods, tab), Some(Action::CycleFocus));
    }

    #[test]
    fn ctrl_c_quits_outside_exec_mode() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map_key(InputMode::Pods, ctrl_c), Some(Action::Quit));
        assert_eq!(map_key(InputMode::Console, ctrl_c), Some(Action::Quit));
    }

    #[test]
    fn picker_mode_maps_escape_to_cancel() {
        let esc = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(map_key(InputMode::Picker, esc), Some(Action::CancelPrompt));
    }

    #[test]
    fn exec_mode_forwards_bytes_verbatim() {
        let ls = KeyEvent::new(KeyCode::Char('l'), KeyModifiers::NONE);
        assert_eq!(
            map_key(InputMode::Exec, ls),
            Some(Action::ExecInput(b"l".to_vec()))
        );

        let ctrl_d = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert_eq!(
            map_key(InputMode::Exec, ctrl_d),
            Some(Action::ExecInput(vec![0x04]))
        );
    }

    #[test]
    fn exec_mode_has_no_quit_key() {
        let quit = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        assert_eq!(
            map_key(InputMode::Exec, quit),
            Some(Action::ExecInput(b"q".to_vec()))
        );
    }

    #[test]
    fn encode_maps_arrows_to_escape_sequences() {
        let up = KeyEvent::new(KeyCode::Up, KeyModifiers::NONE);
        assert_eq!(encode_exec_key(up), Some(b"\x1b[A".to_vec()));
        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(encode_exec_key(enter), Some(vec![b'\r']));
    }

    #[test]
    fn picker_mode_overrides_screen_mode() {
        assert_eq!(InputMode::for_screen(Screen::Pods, true), InputMode::Picker);
        assert_eq!(InputMode::for_screen(Screen::Pods, false), InputMode::Pods);
    }
}
