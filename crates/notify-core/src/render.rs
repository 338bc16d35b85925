//! Pure projections from reconciler state to host-facing views.
//!
//! Nothing here reads back from the host; the store's in-memory count is the
//! only truth and these functions are write-only toward the page.

use crate::types::{BadgePatch, ListView, Notification, RowView, ToastView};

/// Shown in place of a missing server timestamp.
pub const JUST_NOW_PLACEHOLDER: &str = "just now";
/// Shown when the dropdown has no rows.
pub const EMPTY_LIST_MESSAGE: &str = "No notifications";
/// Link value the templates use for "no destination".
pub const LINK_PLACEHOLDER: &str = "#";

const TOAST_PREFIX: &str = "\u{1F514} ";

/// Whether a link points somewhere the client should navigate to.
pub fn is_navigable(link: Option<&str>) -> bool {
    link.map(str::trim)
        .is_some_and(|link| !link.is_empty() && link != LINK_PLACEHOLDER)
}

pub fn render_badge(count: u64, badge_mounted: bool) -> BadgePatch {
    if count == 0 {
        return BadgePatch::Hide;
    }

    let text = count.to_string();
    if badge_mounted {
        BadgePatch::Update { text }
    } else {
        BadgePatch::Create { text }
    }
}

pub fn render_list(items: &[Notification]) -> ListView {
    if items.is_empty() {
        return ListView::Empty {
            message: EMPTY_LIST_MESSAGE.to_owned(),
        };
    }

    ListView::Rows(items.iter().map(render_row).collect())
}

pub fn render_toast(message: &str, link: Option<&str>, duration_ms: u64) -> ToastView {
    ToastView {
        text: format!("{TOAST_PREFIX}{message}"),
        link: link
            .filter(|link| is_navigable(Some(*link)))
            .map(str::to_owned),
        duration_ms,
    }
}

fn render_row(item: &Notification) -> RowView {
    let timestamp_text = item
        .timestamp
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(JUST_NOW_PLACEHOLDER)
        .to_owned();
    let href = item
        .link
        .as_deref()
        .filter(|link| is_navigable(Some(*link)))
        .unwrap_or(LINK_PLACEHOLDER)
        .to_owned();

    RowView {
        data_id: item.id.clone(),
        message: item.message.clone(),
        timestamp_text,
        href,
        unread_marker: !item.read,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{reconciler::NotificationStore, types::NotificationId};

    fn item(id: u64, read: bool) -> Notification {
        Notification {
            id: NotificationId::from(id),
            message: format!("doc {id}"),
            link: Some(format!("/doc/{id}")),
            timestamp: Some("12/03/2025 10:00".to_owned()),
            read,
        }
    }

    #[test]
    fn badge_hides_at_zero_and_creates_when_missing() {
        assert_eq!(render_badge(0, true), BadgePatch::Hide);
        assert_eq!(render_badge(0, false), BadgePatch::Hide);
        assert_eq!(
            render_badge(3, false),
            BadgePatch::Create {
                text: "3".to_owned()
            }
        );
        assert_eq!(
            render_badge(3, true),
            BadgePatch::Update {
                text: "3".to_owned()
            }
        );
    }

    #[test]
    fn empty_list_renders_empty_state() {
        assert_eq!(
            render_list(&[]),
            ListView::Empty {
                message: EMPTY_LIST_MESSAGE.to_owned()
            }
        );
    }

    #[test]
    fn rows_keep_order_and_mark_only_unread() {
        let mut store = NotificationStore::new();
        store.apply_server_list(vec![item(1, false), item(2, true)]);
        assert_eq!(store.unread_count(), 1);

        let ListView::Rows(rows) = render_list(store.items()) else {
            panic!("expected rows");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].data_id.as_str(), "1");
        assert!(rows[0].unread_marker);
        assert_eq!(rows[1].data_id.as_str(), "2");
        assert!(!rows[1].unread_marker);
    }

    #[test]
    fn rows_fall_back_to_placeholders() {
        let bare = Notification {
            id: NotificationId::from(5),
            message: "bare".to_owned(),
            link: None,
            timestamp: None,
            read: false,
        };

        let ListView::Rows(rows) = render_list(&[bare]) else {
            panic!("expected rows");
        };
        assert_eq!(rows[0].timestamp_text, JUST_NOW_PLACEHOLDER);
        assert_eq!(rows[0].href, LINK_PLACEHOLDER);
    }

    #[test]
    fn toast_carries_message_and_only_real_links() {
        let toast = render_toast("X", Some("/doc/1"), 6_000);
        assert!(toast.text.contains('X'));
        assert_eq!(toast.link.as_deref(), Some("/doc/1"));

        assert_eq!(render_toast("X", Some("#"), 6_000).link, None);
        assert_eq!(render_toast("X", Some(""), 6_000).link, None);
        assert_eq!(render_toast("X", None, 6_000).link, None);
    }
}
