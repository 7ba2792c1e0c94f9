use crate::domain::UserId;

// ============== Authorization ==============

/// What a caller is allowed to do with the bot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuthLevel {
    Member,
    /// May run commands on the remote console.
    ConsoleOperator,
}

/// Resolve a caller's level from the operator allowlist and their chat role.
///
/// `role` is whatever the gateway knows about the user's role in the chat
/// (Telegram: the admin custom title). Role names compare exactly.
pub fn authorization_level(
    user_id: Option<UserId>,
    role: Option<&str>,
    operators: &[UserId],
    console_role: &str,
) -> AuthLevel {
    if let Some(user_id) = user_id {
        if operators.contains(&user_id) {
            return AuthLevel::ConsoleOperator;
        }
    }
    if role.is_some_and(|r| r == console_role) {
        return AuthLevel::ConsoleOperator;
    }
    AuthLevel::Member
}
