use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::i18n::Message;

pub const LOGIN_VIEW: &str = "/auth/login";

/// Where anonymous visitors of login-required pages are sent, and what they are told.
#[derive(Debug, Clone)]
pub struct LoginManager {
    pub login_view: String,
    pub login_message: Message<'static>,
}

impl LoginManager {
    pub fn new(login_view: &str, login_message: Message<'static>) -> Self {
        Self {
            login_view: login_view.to_string(),
            login_message,
        }
    }

    pub fn redirect_target(&self, next: &str) -> String {
        format!(
            "{}?next={}",
            self.login_view,
            utf8_percent_encode(next, NON_ALPHANUMERIC)
        )
    }
}

impl Default for LoginManager {
    fn default() -> Self {
        Self::new(LOGIN_VIEW, Message::LoginRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_carries_escaped_next() {
        let manager = LoginManager::default();
        assert_eq!(
            manager.redirect_target("/user/susan"),
            "/auth/login?next=%2Fuser%2Fsusan"
        );
    }
}
