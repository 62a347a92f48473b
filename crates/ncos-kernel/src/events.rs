//! Desktop commits to bus events.

use ncos_bus::{channels, KernelEvent};
use ncos_desktop::Commit;

/// Channel and payload announcing a commit, if it is announced at all.
pub fn commit_event(commit: &Commit) -> Option<(&'static str, KernelEvent)> {
    let event = match commit {
        Commit::WindowOpened { id, kind, .. } => (
            channels::WIN_OPEN,
            KernelEvent::WindowOpened {
                window_id: id.clone(),
                kind: kind.clone(),
            },
        ),
        Commit::WindowClosed { id } => (
            channels::WIN_CLOSE,
            KernelEvent::WindowClosed { window_id: id.clone() },
        ),
        Commit::WindowFocused { id, .. } => (
            channels::WIN_FOCUS,
            KernelEvent::WindowFocused { window_id: id.clone() },
        ),
        Commit::WindowMinimized { id, minimized } => (
            channels::WIN_MINIMIZE,
            KernelEvent::WindowMinimized {
                window_id: id.clone(),
                minimized: *minimized,
            },
        ),
        Commit::WindowMaximized { id, maximized } => (
            channels::WIN_MAXIMIZE,
            KernelEvent::WindowMaximized {
                window_id: id.clone(),
                maximized: *maximized,
            },
        ),
        Commit::WindowMoved { id }
        | Commit::WindowResized { id }
        | Commit::WindowSnapped { id, .. }
        | Commit::WindowAssigned { id, .. } => (
            channels::WIN_UPDATE,
            KernelEvent::WindowUpdated { window_id: id.clone() },
        ),
        Commit::SpaceAdded { id }
        | Commit::SpaceRenamed { id }
        | Commit::SpaceSwitched { id }
        | Commit::SpaceRemoved { fallback: id, .. } => (
            channels::SPACE_CHANGE,
            KernelEvent::SpaceChanged { space_id: *id },
        ),
        Commit::WindowReactivated { .. } | Commit::ActiveChanged { .. } | Commit::ViewportChanged => {
            return None
        }
    };
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ncos_desktop::SnapState;

    #[test]
    fn test_geometry_commits_share_update_channel() {
        for commit in [
            Commit::WindowMoved { id: "w".into() },
            Commit::WindowResized { id: "w".into() },
            Commit::WindowSnapped {
                id: "w".into(),
                snap: SnapState::Left,
            },
        ] {
            let (channel, event) = commit_event(&commit).unwrap();
            assert_eq!(channel, channels::WIN_UPDATE);
            assert_eq!(event, KernelEvent::WindowUpdated { window_id: "w".into() });
        }
    }

    #[test]
    fn test_removed_space_reports_fallback() {
        let (channel, event) = commit_event(&Commit::SpaceRemoved { id: 3, fallback: 1 }).unwrap();
        assert_eq!(channel, channels::SPACE_CHANGE);
        assert_eq!(event, KernelEvent::SpaceChanged { space_id: 1 });
    }

    #[test]
    fn test_bookkeeping_commits_are_silent() {
        assert!(commit_event(&Commit::ActiveChanged { id: None }).is_none());
        assert!(commit_event(&Commit::ViewportChanged).is_none());
        assert!(commit_event(&Commit::WindowReactivated { id: "w".into() }).is_none());
    }
}
