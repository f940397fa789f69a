use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use time::Duration;
use uuid::Uuid;

use crate::config::SESSION_LIFETIME_HOURS;

/// Name of the encrypted cookie carrying the session id.
pub const SESSION_COOKIE: &str = "sid";

/// Session id of the caller, if the request carries a valid session cookie.
pub fn current_session(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|c| c.value().to_owned())
        .filter(|v| !v.is_empty())
}

/// Return the caller's session id, starting a new session when there is none.
/// The returned jar must be sent back with the response.
pub fn ensure_session(jar: PrivateCookieJar, secure: bool) -> (PrivateCookieJar, String) {
    if let Some(sid) = current_session(&jar) {
        return (jar, sid);
    }
    let sid = Uuid::new_v4().to_string();
    let jar = jar.add(build_cookie(sid.clone(), secure));
    (jar, sid)
}

fn build_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build(Cookie::new(SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::hours(SESSION_LIFETIME_HOURS))
        .build()
}
