//! Every piece of SteamCMD console text the driver reacts to.

pub const LOGIN_ATTEMPT: &[&str] = &["Logging in user", "Connecting anonymously to"];
pub const GUARD_PROMPT: &[&str] = &["Steam Guard code:", "Two-factor code:"];
pub const LOGIN_COMPLETE: &str = "Waiting for user info...OK";
/// Older clients print this, then one more line containing `OK` once the profile is loaded.
pub const LEGACY_LOGGED_IN: &str = "Logged in OK";
pub const LEGACY_OK: &str = "OK";
pub const LOGIN_FAILURE: &[&str] = &["FAILED login with result code", "Login Failure:"];
pub const DOWNLOAD_SUCCESS: &str = "Success. Downloaded item ";
pub const DOWNLOAD_ERROR: &str = "ERROR!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    LoginAttempt,
    GuardPrompt,
    LoginComplete,
    LegacyLoggedIn,
    LoginFailure,
    DownloadSuccess(u64),
    DownloadError,
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

/// Classifies one line of output. More specific markers win over generic ones.
pub fn classify(text: &str) -> Option<Marker> {
    if contains_any(text, LOGIN_FAILURE) {
        return Some(Marker::LoginFailure);
    }
    if contains_any(text, GUARD_PROMPT) {
        return Some(Marker::GuardPrompt);
    }
    if text.contains(LOGIN_COMPLETE) {
        return Some(Marker::LoginComplete);
    }
    if text.contains(LEGACY_LOGGED_IN) {
        return Some(Marker::LegacyLoggedIn);
    }
    if contains_any(text, LOGIN_ATTEMPT) {
        return Some(Marker::LoginAttempt);
    }
    if let Some(id) = downloaded_item(text) {
        return Some(Marker::DownloadSuccess(id));
    }
    if text.contains(DOWNLOAD_ERROR) {
        return Some(Marker::DownloadError);
    }
    None
}

/// Unterminated output worth reacting to before its newline arrives.
pub fn is_prompt(text: &str) -> bool {
    contains_any(text, GUARD_PROMPT) || contains_any(text, LOGIN_ATTEMPT)
}

fn downloaded_item(text: &str) -> Option<u64> {
    let start = text.find(DOWNLOAD_SUCCESS)? + DOWNLOAD_SUCCESS.len();
    let digits: String = text[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_login_lines() {
        assert_eq!(classify("Logging in user 'bob' to Steam Public..."), Some(Marker::LoginAttempt));
        assert_eq!(classify("Connecting anonymously to Steam Public...OK"), Some(Marker::LoginAttempt));
        assert_eq!(classify("Waiting for user info...OK"), Some(Marker::LoginComplete));
        assert_eq!(classify("Logged in OK"), Some(Marker::LegacyLoggedIn));
        assert_eq!(classify("FAILED login with result code Invalid Password"), Some(Marker::LoginFailure));
        assert_eq!(classify("Steam Guard code:"), Some(Marker::GuardPrompt));
        assert_eq!(classify("Two-factor code:"), Some(Marker::GuardPrompt));
        assert_eq!(classify("Loading Steam API...OK"), None);
    }

    #[test]
    fn reads_the_downloaded_item_id() {
        let line = r#"Success. Downloaded item 450814997 to "/srv/steamapps/workshop/content/107410/450814997" (1024 bytes)"#;
        assert_eq!(classify(line), Some(Marker::DownloadSuccess(450814997)));
        assert_eq!(classify("ERROR! Download item 555 failed (Failure)."), Some(Marker::DownloadError));
    }

    #[test]
    fn prompts_include_partial_login_lines() {
        assert!(is_prompt("Logging in user 'bob' to Steam Public..."));
        assert!(is_prompt("Steam Guard code:"));
        assert!(!is_prompt("Steam>"));
    }
}
