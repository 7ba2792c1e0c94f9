use chrono::{DateTime, Utc};
use teloxide::{
    prelude::*,
    types::{Message, User},
};

use cbot_core::relay::{LifecycleEvent, Member};

use crate::router::AppState;

pub(super) async fn handle_new_members(
    msg: &Message,
    joined: &[User],
    state: &AppState,
) -> ResponseResult<()> {
    let title = msg.chat.title().unwrap_or("the chat");
    for event in joined_events(joined, title, msg.date) {
        state.relay.relay_logged(&event).await;
    }
    Ok(())
}

/// Telegram exposes neither account creation dates nor direct avatar URLs to
/// bots, so those fields stay empty.
fn joined_events(users: &[User], chat_title: &str, joined_at: DateTime<Utc>) -> Vec<LifecycleEvent> {
    users
        .iter()
        .filter(|u| !u.is_bot)
        .map(|u| LifecycleEvent::MemberJoined {
            member: Member {
                user_id: u.id.0 as i64,
                display_name: u.full_name(),
                avatar_url: None,
            },
            chat_title: chat_title.to_string(),
            account_created: None,
            joined_at,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn user(id: u64, first: &str, last: Option<&str>, is_bot: bool) -> User {
        serde_json::from_value(json!({
            "id": id,
            "is_bot": is_bot,
            "first_name": first,
            "last_name": last,
        }))
        .unwrap()
    }

    #[test]
    fn bots_are_not_welcomed() {
        let at = Utc.with_ymd_and_hms(2024, 7, 18, 9, 5, 0).unwrap();
        let users = vec![
            user(7, "Elder", Some("Toad"), false),
            user(8, "CalliBot", None, true),
        ];

        let events = joined_events(&users, "Calli & Friends", at);
        assert_eq!(events.len(), 1);
        match &events[0] {
            LifecycleEvent::MemberJoined {
                member,
                chat_title,
                joined_at,
                account_created,
            } => {
                assert_eq!(member.user_id, 7);
                assert_eq!(member.display_name, "Elder Toad");
                assert_eq!(chat_title, "Calli & Friends");
                assert_eq!(*joined_at, at);
                assert!(account_created.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
