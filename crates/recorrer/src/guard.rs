//! Session guards for clickable elements.
//!
//! Clicking a logout affordance would end the seeded session and strand the
//! rest of the run on a login page, so both strategies screen every element
//! before clicking it.

use crate::driver::ElementHandle;

const LOGOUT_KEYWORDS: &[&str] = &[
    "logout", "log out", "sign out", "signout", "退出", "登出", "exit",
];
const LOGIN_KEYWORDS: &[&str] = &["login", "log in", "sign in", "signin", "登录", "登入"];

fn lower_attr(element: &ElementHandle, name: &str) -> String {
    element.attr(name).unwrap_or("").to_lowercase()
}

/// Whether the element looks like a login or logout affordance, judged from
/// its text, `href`, `onclick`, class and id.
#[must_use]
pub fn is_auth_related(element: &ElementHandle) -> bool {
    let text = element.text.trim().to_lowercase();
    let href = lower_attr(element, "href");
    let onclick = lower_attr(element, "onclick");
    let class = lower_attr(element, "class");
    let id = lower_attr(element, "id");

    let keywords = LOGOUT_KEYWORDS.iter().chain(LOGIN_KEYWORDS);
    for keyword in keywords.clone() {
        if text.contains(keyword) {
            return true;
        }
    }

    if href.contains("login") || href.contains("logout") {
        return true;
    }

    for keyword in keywords {
        if onclick.contains(keyword) {
            return true;
        }
    }

    class.contains("logout")
        || class.contains("login")
        || id.contains("logout")
        || id.contains("login")
}

/// Whether the element is disabled (`disabled` attribute present or
/// `aria-disabled="true"`)
#[must_use]
pub fn is_disabled(element: &ElementHandle) -> bool {
    element.attr("disabled").is_some() || element.attr("aria-disabled") == Some("true")
}
