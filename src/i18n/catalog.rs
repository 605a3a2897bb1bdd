use std::collections::HashMap;

use crate::i18n::locale::FALLBACK_LOCALE;

/// Every user-facing string that goes through translation. Texts live in
/// `locales/<locale>.yml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message<'a> {
    LoginRequired,
    TranslationNotConfigured,
    NowFollowing { username: &'a str },
    NoLongerFollowing { username: &'a str },
    CannotFollowSelf,
    UserNotFound { username: &'a str },
    PostPublished,
    ExportQueued,
    SearchDisabled,
    PageNotFound,
    InternalError,
    Back,
}

/// Maps each configured language tag onto a bundled catalog.
pub struct Localizer {
    catalogs: HashMap<String, &'static str>,
}

impl Localizer {
    /// Tags without a catalog of their own use their primary subtag's
    /// (`zh-CN` reads `zh`), and English otherwise.
    pub fn new(languages: &[String]) -> Self {
        let available = rust_i18n::available_locales!();
        let catalogs = languages
            .iter()
            .map(|lang| {
                let tag = lang.replace('_', "-").to_ascii_lowercase();
                let primary = tag.split('-').next().unwrap_or_default();
                let catalog = available
                    .iter()
                    .find(|locale| locale.eq_ignore_ascii_case(&tag))
                    .or_else(|| available.iter().find(|&&locale| locale == primary))
                    .copied()
                    .unwrap_or(FALLBACK_LOCALE);
                (lang.clone(), catalog)
            })
            .collect();
        Self { catalogs }
    }

    pub fn gettext(&self, locale: &str, message: Message<'_>) -> String {
        let locale = self.catalogs.get(locale).copied().unwrap_or(FALLBACK_LOCALE);
        let text = match message {
            Message::LoginRequired => t!("login_required", locale = locale),
            Message::TranslationNotConfigured => t!("translation_not_configured", locale = locale),
            Message::NowFollowing { username } => {
                t!("now_following", locale = locale, username = username)
            }
            Message::NoLongerFollowing { username } => {
                t!("no_longer_following", locale = locale, username = username)
            }
            Message::CannotFollowSelf => t!("cannot_follow_self", locale = locale),
            Message::UserNotFound { username } => {
                t!("user_not_found", locale = locale, username = username)
            }
            Message::PostPublished => t!("post_published", locale = locale),
            Message::ExportQueued => t!("export_queued", locale = locale),
            Message::SearchDisabled => t!("search_disabled", locale = locale),
            Message::PageNotFound => t!("page_not_found", locale = locale),
            Message::InternalError => t!("internal_error", locale = locale),
            Message::Back => t!("back", locale = locale),
        };
        text.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localizer() -> Localizer {
        Localizer::new(&["en".to_string(), "zh".to_string()])
    }

    #[test]
    fn english_catalog() {
        assert_eq!(
            localizer().gettext("en", Message::LoginRequired),
            "Please log in to access this page."
        );
    }

    #[test]
    fn chinese_catalog_is_loaded() {
        assert_eq!(
            localizer().gettext("zh", Message::TranslationNotConfigured),
            "错误：翻译服务未配置。"
        );
    }

    #[test]
    fn unconfigured_locale_falls_back_to_english() {
        assert_eq!(
            localizer().gettext("fr", Message::CannotFollowSelf),
            "You cannot follow yourself!"
        );
    }

    #[test]
    fn regional_tags_use_the_primary_catalog() {
        let localizer = Localizer::new(&["en-US".to_string(), "zh_CN".to_string()]);
        assert_eq!(localizer.gettext("zh_CN", Message::Back), "返回");
        assert_eq!(localizer.gettext("en-US", Message::Back), "Back");
    }

    #[test]
    fn usernames_are_interpolated() {
        assert_eq!(
            localizer().gettext("en", Message::NowFollowing { username: "susan" }),
            "You are following susan!"
        );
        assert_eq!(
            localizer().gettext("zh", Message::UserNotFound { username: "john" }),
            "未找到用户 john。"
        );
    }
}
