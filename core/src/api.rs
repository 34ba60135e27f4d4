//! Stateless request builder and response parser for the Bassa API.
//!
//! # Design
//! `BassaApi` holds only the validated base URL. Each endpoint has a
//! `build_*` method that checks its arguments and produces an `HttpRequest`;
//! nothing here touches the network. Required string arguments that are
//! empty (or only whitespace) are rejected with `MissingArgument` before a
//! request exists, so an invalid call can never reach the server.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::address::BaseUrl;
use crate::error::BassaError;
use crate::http::{encode_form, HttpMethod, HttpRequest, HttpResponse, FORM_CONTENT_TYPE};
use crate::session::Session;
use crate::types::{AuthLevel, NewUser, UserUpdate};

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@",
        r"[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?",
        r"(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    ))
    .expect("email pattern compiles")
});

/// Request builder for every Bassa endpoint.
#[derive(Debug, Clone)]
pub struct BassaApi {
    base_url: BaseUrl,
}

impl BassaApi {
    pub fn new(base_url: BaseUrl) -> Self {
        Self { base_url }
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    pub fn build_login(&self, user_name: &str, password: &str) -> Result<HttpRequest, BassaError> {
        required("user_name", user_name)?;
        required("password", password)?;
        Ok(self.form(
            HttpMethod::Post,
            "/api/login".to_string(),
            None,
            &[("user_name", user_name), ("password", password)],
        ))
    }

    /// Sign up a regular (auth level 1) user.
    pub fn build_add_regular_user(
        &self,
        session: &Session,
        user: &NewUser,
    ) -> Result<HttpRequest, BassaError> {
        validate_new_user(user)?;
        Ok(self.form(
            HttpMethod::Post,
            "/api/regularuser".to_string(),
            Some(session),
            &[
                ("user_name", user.user_name.as_str()),
                ("password", user.password.as_str()),
                ("email", user.email.as_str()),
            ],
        ))
    }

    /// Create a user with an explicit auth level.
    pub fn build_add_user(
        &self,
        session: &Session,
        user: &NewUser,
        auth_level: AuthLevel,
    ) -> Result<HttpRequest, BassaError> {
        validate_new_user(user)?;
        Ok(self.form(
            HttpMethod::Post,
            "/api/user".to_string(),
            Some(session),
            &[
                ("user_name", user.user_name.as_str()),
                ("password", user.password.as_str()),
                ("email", user.email.as_str()),
                ("auth", auth_level.wire_value()),
            ],
        ))
    }

    pub fn build_remove_user(
        &self,
        session: &Session,
        user_name: &str,
    ) -> Result<HttpRequest, BassaError> {
        required("user_name", user_name)?;
        Ok(self.bare(
            HttpMethod::Delete,
            format!("/api/user/{}", segment(user_name)),
            session,
        ))
    }

    /// Replace `user_name`'s account details with `update`.
    pub fn build_update_user(
        &self,
        session: &Session,
        user_name: &str,
        update: &UserUpdate,
    ) -> Result<HttpRequest, BassaError> {
        required("user_name", user_name)?;
        required("new_user_name", &update.user_name)?;
        required("password", &update.password)?;
        required("email", &update.email)?;
        validate_email(&update.email)?;
        Ok(self.form(
            HttpMethod::Put,
            format!("/api/user/{}", segment(user_name)),
            Some(session),
            &[
                ("user_name", update.user_name.as_str()),
                ("password", update.password.as_str()),
                ("auth_level", update.auth_level.wire_value()),
                ("email", update.email.as_str()),
            ],
        ))
    }

    pub fn build_get_user(&self, session: &Session) -> HttpRequest {
        self.bare(HttpMethod::Get, "/api/user".to_string(), session)
    }

    pub fn build_user_signup_requests(&self, session: &Session) -> HttpRequest {
        self.bare(HttpMethod::Get, "/api/user/requests".to_string(), session)
    }

    pub fn build_approve_user(
        &self,
        session: &Session,
        user_name: &str,
    ) -> Result<HttpRequest, BassaError> {
        required("user_name", user_name)?;
        Ok(self.bare(
            HttpMethod::Post,
            format!("/api/user/approve/{}", segment(user_name)),
            session,
        ))
    }

    pub fn build_blocked_users(&self, session: &Session) -> HttpRequest {
        self.bare(HttpMethod::Get, "/api/user/blocked".to_string(), session)
    }

    pub fn build_block_user(
        &self,
        session: &Session,
        user_name: &str,
    ) -> Result<HttpRequest, BassaError> {
        required("user_name", user_name)?;
        Ok(self.bare(
            HttpMethod::Post,
            format!("/api/user/blocked/{}", segment(user_name)),
            session,
        ))
    }

    pub fn build_unblock_user(
        &self,
        session: &Session,
        user_name: &str,
    ) -> Result<HttpRequest, BassaError> {
        required("user_name", user_name)?;
        Ok(self.bare(
            HttpMethod::Delete,
            format!("/api/user/blocked/{}", segment(user_name)),
            session,
        ))
    }

    /// Downloads of the logged-in user. `limit` is a page index; `1` returns
    /// the first 25 records.
    pub fn build_user_downloads(&self, session: &Session, limit: u32) -> HttpRequest {
        self.bare(
            HttpMethod::Get,
            format!("/api/user/downloads/{limit}"),
            session,
        )
    }

    pub fn build_heaviest_users(&self, session: &Session) -> HttpRequest {
        self.bare(HttpMethod::Get, "/api/user/heavy".to_string(), session)
    }

    // -----------------------------------------------------------------------
    // Downloads
    // -----------------------------------------------------------------------

    /// Start processing the download queue. Authorized by the session's server key.
    pub fn build_start_download(&self, session: &Session) -> HttpRequest {
        self.keyed("/api/download/start", session)
    }

    /// Kill every running download. Authorized by the session's server key.
    pub fn build_kill_download(&self, session: &Session) -> HttpRequest {
        self.keyed("/api/download/kill", session)
    }

    pub fn build_add_download(
        &self,
        session: &Session,
        link: &str,
    ) -> Result<HttpRequest, BassaError> {
        required("link", link)?;
        Ok(self.form(
            HttpMethod::Post,
            "/api/download".to_string(),
            Some(session),
            &[("link", link)],
        ))
    }

    pub fn build_remove_download(&self, session: &Session, id: u64) -> HttpRequest {
        self.bare(HttpMethod::Delete, format!("/api/download/{id}"), session)
    }

    pub fn build_rate_download(&self, session: &Session, id: u64, rate: u32) -> HttpRequest {
        let rate = rate.to_string();
        self.form(
            HttpMethod::Post,
            format!("/api/download/{id}"),
            Some(session),
            &[("rate", rate.as_str())],
        )
    }

    /// All downloads, paged like [`BassaApi::build_user_downloads`].
    pub fn build_downloads(&self, session: &Session, limit: u32) -> HttpRequest {
        self.bare(HttpMethod::Get, format!("/api/downloads/{limit}"), session)
    }

    pub fn build_download(&self, session: &Session, id: u64) -> HttpRequest {
        self.bare(HttpMethod::Get, format!("/api/download/{id}"), session)
    }

    // -----------------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------------

    /// Compress the files identified by `gids` into one archive.
    pub fn build_start_compression<S: AsRef<str>>(
        &self,
        session: &Session,
        gids: &[S],
    ) -> Result<HttpRequest, BassaError> {
        if gids.is_empty() {
            return Err(BassaError::MissingArgument("gid"));
        }
        let mut fields = Vec::with_capacity(gids.len());
        for gid in gids {
            let gid = gid.as_ref();
            required("gid", gid)?;
            fields.push(("gid", gid));
        }
        Ok(self.form(
            HttpMethod::Post,
            "/api/compress".to_string(),
            Some(session),
            &fields,
        ))
    }

    pub fn build_compression_progress(
        &self,
        session: &Session,
        id: &str,
    ) -> Result<HttpRequest, BassaError> {
        required("id", id)?;
        Ok(self.bare(
            HttpMethod::Get,
            format!("/api/compression-progress/{}", segment(id)),
            session,
        ))
    }

    /// Metadata for the file with identifier `gid`.
    pub fn build_file(&self, session: &Session, gid: &str) -> Result<HttpRequest, BassaError> {
        required("gid", gid)?;
        let query = encode_form([("gid", gid)]);
        Ok(self.bare(HttpMethod::Get, format!("/api/file?{query}"), session))
    }

    // -----------------------------------------------------------------------
    // Responses
    // -----------------------------------------------------------------------

    /// Extract the session token from a login response.
    ///
    /// Only HTTP 200 counts as a successful login.
    pub fn parse_login(&self, response: &HttpResponse) -> Result<Session, BassaError> {
        if response.status != 200 {
            return Err(BassaError::ServerRejected {
                status: response.status,
                body: response.body.clone(),
            });
        }
        response
            .header("token")
            .filter(|token| !token.is_empty())
            .map(Session::with_token)
            .ok_or(BassaError::MissingToken)
    }

    /// Decode a successful response body. An empty body decodes to `null`.
    pub fn parse_json(&self, response: &HttpResponse) -> Result<Value, BassaError> {
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&response.body)
            .map_err(|e| BassaError::Deserialization(e.to_string()))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn form(
        &self,
        method: HttpMethod,
        path: String,
        session: Option<&Session>,
        fields: &[(&str, &str)],
    ) -> HttpRequest {
        HttpRequest {
            method,
            url: self.base_url.join(&path),
            headers: headers(session),
            body: Some(encode_form(fields.iter().copied())),
        }
    }

    fn bare(&self, method: HttpMethod, path: String, session: &Session) -> HttpRequest {
        HttpRequest {
            method,
            url: self.base_url.join(&path),
            headers: headers(Some(session)),
            body: None,
        }
    }

    fn keyed(&self, path: &str, session: &Session) -> HttpRequest {
        let mut request = self.bare(HttpMethod::Get, path.to_string(), session);
        request
            .headers
            .push(("key".to_string(), session.key().to_string()));
        request
    }
}

fn headers(session: Option<&Session>) -> Vec<(String, String)> {
    let mut headers = vec![("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string())];
    if let Some(token) = session.and_then(Session::token) {
        headers.push(("token".to_string(), token.to_string()));
    }
    headers
}

fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn required(name: &'static str, value: &str) -> Result<(), BassaError> {
    if value.is_empty() {
        Err(BassaError::MissingArgument(name))
    } else {
        Ok(())
    }
}

fn validate_new_user(user: &NewUser) -> Result<(), BassaError> {
    required("user_name", &user.user_name)?;
    required("password", &user.password)?;
    required("email", &user.email)?;
    validate_email(&user.email)
}

fn validate_email(email: &str) -> Result<(), BassaError> {
    if EMAIL.is_match(email) {
        Ok(())
    } else {
        Err(BassaError::InvalidArgument {
            name: "email",
            reason: format!("{email:?} is not an email address"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> BassaApi {
        BassaApi::new(BaseUrl::parse("http://localhost:5000").unwrap())
    }

    fn session() -> Session {
        Session::with_token("abc123")
    }

    fn form_of(request: &HttpRequest) -> Vec<(String, String)> {
        url::form_urlencoded::parse(request.body.as_deref().unwrap().as_bytes())
            .into_owned()
            .collect()
    }

    #[test]
    fn build_login_produces_form_post_without_token() {
        let req = api().build_login("rand", "pass").unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:5000/api/login");
        assert_eq!(
            req.headers,
            vec![(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string()
            )]
        );
        assert_eq!(req.body.as_deref(), Some("user_name=rand&password=pass"));
    }

    #[test]
    fn build_login_rejects_missing_credentials() {
        let err = api().build_login("", "pass").unwrap_err();
        assert!(matches!(err, BassaError::MissingArgument("user_name")));
        let err = api().build_login("rand", "").unwrap_err();
        assert!(matches!(err, BassaError::MissingArgument("password")));
    }

    #[test]
    fn whitespace_is_a_value_not_a_missing_argument() {
        let req = api().build_login("rand", "   ").unwrap();
        assert_eq!(req.body.as_deref(), Some("user_name=rand&password=+++"));
        let req = api()
            .build_add_regular_user(&session(), &NewUser::new("a", " ", "a@b.org"))
            .unwrap();
        assert_eq!(req.body.as_deref(), Some("user_name=a&password=+&email=a%40b.org"));
    }

    #[test]
    fn authenticated_requests_carry_token() {
        let req = api().build_get_user(&session());
        assert_eq!(req.header("token"), Some("abc123"));
        assert_eq!(req.header("content-type"), Some(FORM_CONTENT_TYPE));
        assert!(req.body.is_none());
    }

    #[test]
    fn anonymous_requests_have_no_token() {
        let req = api().build_heaviest_users(&Session::anonymous());
        assert_eq!(req.header("token"), None);
    }

    #[test]
    fn build_add_user_sends_auth_level() {
        let user = NewUser::new("MehantAdmin", "secretpass", "kmehant@scorelab.org");
        let req = api()
            .build_add_user(&session(), &user, AuthLevel::Admin)
            .unwrap();
        assert_eq!(req.url, "http://localhost:5000/api/user");
        let form = form_of(&req);
        assert!(form.contains(&("auth".to_string(), "0".to_string())));
        assert!(form.contains(&("email".to_string(), "kmehant@scorelab.org".to_string())));
    }

    #[test]
    fn build_add_regular_user_validates_email() {
        let user = NewUser::new("Mehant", "secretpass", "not-an-email");
        let err = api().build_add_regular_user(&session(), &user).unwrap_err();
        assert!(matches!(err, BassaError::InvalidArgument { name: "email", .. }));

        let user = NewUser::new("Mehant", "secretpass", "");
        let err = api().build_add_regular_user(&session(), &user).unwrap_err();
        assert!(matches!(err, BassaError::MissingArgument("email")));
    }

    #[test]
    fn build_update_user_targets_old_name_and_sends_new_one() {
        let update = UserUpdate {
            user_name: "Mehant".to_string(),
            password: "newsecretpass".to_string(),
            auth_level: AuthLevel::Admin,
            email: "kmehant@gmail.com".to_string(),
        };
        let req = api()
            .build_update_user(&session(), "MehantAdmin", &update)
            .unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.url, "http://localhost:5000/api/user/MehantAdmin");
        assert_eq!(
            form_of(&req),
            vec![
                ("user_name".to_string(), "Mehant".to_string()),
                ("password".to_string(), "newsecretpass".to_string()),
                ("auth_level".to_string(), "0".to_string()),
                ("email".to_string(), "kmehant@gmail.com".to_string()),
            ]
        );
    }

    #[test]
    fn user_path_segments_are_percent_encoded() {
        let req = api().build_block_user(&session(), "a b/c").unwrap();
        assert_eq!(req.url, "http://localhost:5000/api/user/blocked/a%20b%2Fc");
    }

    #[test]
    fn start_and_kill_send_server_key() {
        let s = session().server_key("s3cret");
        let start = api().build_start_download(&s);
        assert_eq!(start.method, HttpMethod::Get);
        assert_eq!(start.url, "http://localhost:5000/api/download/start");
        assert_eq!(start.header("key"), Some("s3cret"));

        let kill = api().build_kill_download(&Session::anonymous());
        assert_eq!(kill.url, "http://localhost:5000/api/download/kill");
        assert_eq!(kill.header("key"), Some("123456789"));
    }

    #[test]
    fn other_requests_do_not_send_server_key() {
        let req = api().build_downloads(&session(), 1);
        assert_eq!(req.header("key"), None);
    }

    #[test]
    fn build_rate_download_posts_rate_to_id() {
        let req = api().build_rate_download(&session(), 42, 5);
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:5000/api/download/42");
        assert_eq!(req.body.as_deref(), Some("rate=5"));
    }

    #[test]
    fn build_start_compression_repeats_gid() {
        let req = api()
            .build_start_compression(&session(), &["2089b05ecca3d829", "d7c4c4e6b7a4f7d1"])
            .unwrap();
        assert_eq!(
            req.body.as_deref(),
            Some("gid=2089b05ecca3d829&gid=d7c4c4e6b7a4f7d1")
        );
    }

    #[test]
    fn build_start_compression_rejects_empty_list() {
        let empty: [&str; 0] = [];
        let err = api().build_start_compression(&session(), &empty).unwrap_err();
        assert!(matches!(err, BassaError::MissingArgument("gid")));
        let err = api()
            .build_start_compression(&session(), &["ok", ""])
            .unwrap_err();
        assert!(matches!(err, BassaError::MissingArgument("gid")));
    }

    #[test]
    fn build_file_uses_query_parameter() {
        let req = api().build_file(&session(), "2089b05ecca3d829").unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:5000/api/file?gid=2089b05ecca3d829");
        assert!(req.body.is_none());
    }

    #[test]
    fn parse_login_reads_token_header() {
        let response = HttpResponse {
            status: 200,
            headers: vec![("token".to_string(), "abc123".to_string())],
            body: String::new(),
        };
        let session = api().parse_login(&response).unwrap();
        assert_eq!(session.token(), Some("abc123"));
    }

    #[test]
    fn parse_login_requires_status_200_and_token() {
        let err = api().parse_login(&HttpResponse::new(201, "")).unwrap_err();
        assert!(matches!(err, BassaError::ServerRejected { status: 201, .. }));
        let err = api().parse_login(&HttpResponse::new(200, "")).unwrap_err();
        assert!(matches!(err, BassaError::MissingToken));
    }

    #[test]
    fn parse_json_decodes_body_and_tolerates_empty() {
        let value = api()
            .parse_json(&HttpResponse::new(200, r#"[{"id":1,"link":"http://x"}]"#))
            .unwrap();
        assert_eq!(value[0]["id"], 1);
        assert_eq!(api().parse_json(&HttpResponse::new(204, "")).unwrap(), Value::Null);
        let err = api().parse_json(&HttpResponse::new(200, "not json")).unwrap_err();
        assert!(matches!(err, BassaError::Deserialization(_)));
    }
}
