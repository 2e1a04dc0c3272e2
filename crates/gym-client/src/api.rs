//! Typed gym API calls
//!
//! Thin wrappers over `RequestPipeline::send` for the endpoints the app
//! uses. Each one inherits bearer handling, refresh-and-replay and error
//! normalization from the pipeline.

use common::Secret;
use gym_auth::UserProfile;
use serde::{Deserialize, Serialize};
use tracing::debug;
use transport::{FilePart, RequestSpec};

use crate::error::Result;
use crate::normalize::{Failure, normalize};
use crate::session::SessionFacade;

/// Largest avatar accepted for upload.
pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// Multipart field the server reads the avatar from.
pub const AVATAR_FIELD: &str = "avatar";

/// Body of `PUT /users`. Passwords are only sent when changing them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccountUpdate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<Secret<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_password: Option<Secret<String>>,
}

#[derive(Serialize)]
struct SignUpRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: Secret<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: u64,
    pub name: String,
    pub group: String,
    pub series: u32,
    pub repetitions: u32,
    /// Demo animation file name
    pub demo: String,
    /// Thumbnail file name
    pub thumb: String,
}

#[derive(Deserialize)]
struct AvatarResponse {
    avatar: String,
}

/// File name the avatar is uploaded under: `{user name}.{ext}` with spaces
/// turned into underscores, lower-cased.
pub fn avatar_file_name(user_name: &str, extension: &str) -> String {
    format!("{user_name}.{extension}")
        .trim()
        .replace(' ', "_")
        .to_lowercase()
}

fn to_body<T: Serialize>(body: &T) -> Result<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| normalize(Failure::Decode(e.to_string())))
}

impl SessionFacade {
    /// Create an account. Does not sign in.
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<()> {
        let body = SignUpRequest {
            name,
            email,
            password: Secret::from(password),
        };
        let request = RequestSpec::post("/users").json(to_body(&body)?);
        self.send(&request).await?;
        Ok(())
    }

    /// Update name and optionally password, then store the new name locally.
    pub async fn update_account(&self, update: &AccountUpdate) -> Result<()> {
        let request = RequestSpec::put("/users").json(to_body(update)?);
        self.send(&request).await?;

        let Some(mut user) = self.current_session().user().cloned() else {
            return Err(normalize(Failure::MissingCredential));
        };
        user.name = update.name.clone();
        self.update_profile(user).await
    }

    /// Upload a new avatar and store the file name the server assigned.
    ///
    /// Files over `MAX_AVATAR_BYTES` are rejected before any request.
    pub async fn upload_avatar(&self, mut file: FilePart) -> Result<UserProfile> {
        if file.len() > MAX_AVATAR_BYTES {
            return Err(normalize(Failure::TooLarge {
                size: file.len(),
                limit: MAX_AVATAR_BYTES,
            }));
        }
        file.field = AVATAR_FIELD.to_owned();
        debug!(bytes = file.len(), mime = %file.mime, "uploading avatar");

        let request = RequestSpec::patch("/users/avatar").multipart(vec![file]);
        let response: AvatarResponse = self.pipeline().send_json(&request).await?;

        let Some(mut user) = self.current_session().user().cloned() else {
            return Err(normalize(Failure::MissingCredential));
        };
        user.avatar = Some(response.avatar);
        self.update_profile(user.clone()).await?;
        Ok(user)
    }

    /// Where the user's avatar is served, if they have one.
    pub fn avatar_url(&self, user: &UserProfile) -> Option<String> {
        user.avatar
            .as_ref()
            .map(|avatar| format!("{}/avatar/{avatar}", self.base_url()))
    }

    pub async fn exercise(&self, id: &str) -> Result<Exercise> {
        self.pipeline()
            .send_json(&RequestSpec::get(format!("/exercises/{id}")))
            .await
    }

    /// Mark an exercise as done.
    pub async fn register_history(&self, exercise_id: &str) -> Result<()> {
        let request =
            RequestSpec::post("/history").json(serde_json::json!({ "exercise_id": exercise_id }));
        self.send(&request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{EMAIL, PASSWORD, ScriptedTransport};
    use gym_auth::CredentialStore;
    use std::sync::Arc;
    use transport::{ExecuteFuture, RequestBody, Response, Transport, TransportFailure};

    /// Serves the gym endpoints with canned bodies, for decoding tests.
    struct GymApi;

    impl Transport for GymApi {
        fn execute<'a>(
            &'a self,
            request: &'a RequestSpec,
            bearer: Option<&'a str>,
        ) -> ExecuteFuture<'a> {
            let reply = match (request.path.as_str(), bearer) {
                ("/sessions", _) => Ok(Response::new(
                    200,
                    r#"{"user":{"id":1,"name":"Ana Souza","email":"ana@example.com","avatar":null},"token":"at_1","refresh_token":"rt_1"}"#,
                )),
                ("/users", None) => Ok(Response::new(201, "")),
                (_, None) => Err(TransportFailure::Status {
                    status: 401,
                    body: r#"{"message":"token.missing"}"#.into(),
                }),
                ("/users", Some(_)) => Ok(Response::new(204, "")),
                ("/users/avatar", Some(_)) => Ok(Response::new(
                    200,
                    r#"{"id":1,"name":"Ana Souza","email":"ana@example.com","avatar":"8c1f.png"}"#,
                )),
                ("/exercises/12", Some(_)) => Ok(Response::new(
                    200,
                    r#"{"id":12,"name":"Puxada frontal","series":3,"repetitions":12,"group":"costas","demo":"puxada.gif","thumb":"puxada.png","created_at":"2024-01-01","updated_at":"2024-01-01"}"#,
                )),
                ("/exercises/99", Some(_)) => Err(TransportFailure::Status {
                    status: 404,
                    body: r#"{"status":"error","message":"Exercício não encontrado."}"#.into(),
                }),
                (_, Some(_)) => Ok(Response::new(201, "")),
            };
            Box::pin(async move { reply })
        }

        fn base_url(&self) -> &str {
            "http://10.7.100.7:3333"
        }
    }

    async fn signed_in(dir: &tempfile::TempDir) -> SessionFacade {
        let facade =
            SessionFacade::init(Arc::new(GymApi), CredentialStore::new(dir.path().join("s.json"))).await;
        facade.sign_in("ana@example.com", "s3cret").await.unwrap();
        facade
    }

    #[test]
    fn avatar_file_name_is_normalized() {
        assert_eq!(avatar_file_name("Ana Souza", "PNG"), "ana_souza.png");
        assert_eq!(avatar_file_name(" Bia ", "jpg"), "bia_.jpg");
    }

    #[test]
    fn account_update_omits_missing_passwords() {
        let body = to_body(&AccountUpdate {
            name: "Ana".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"name": "Ana"}));

        let body = to_body(&AccountUpdate {
            name: "Ana".into(),
            password: Some(Secret::from("new")),
            old_password: Some(Secret::from("old")),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"name": "Ana", "password": "new", "old_password": "old"})
        );
    }

    #[tokio::test]
    async fn sign_up_sends_password_in_body() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new();
        let facade =
            SessionFacade::init(transport.clone(), CredentialStore::new(dir.path().join("s.json"))).await;
        facade.sign_in(EMAIL, PASSWORD).await.unwrap();

        facade.sign_up("Ana", "ana@example.com", "s3cret").await.unwrap();

        let (request, _) = transport.seen().pop().unwrap();
        assert_eq!(request.path, "/users");
        assert_eq!(
            request.body,
            RequestBody::Json(serde_json::json!({
                "name": "Ana",
                "email": "ana@example.com",
                "password": "s3cret",
            }))
        );
    }

    #[tokio::test]
    async fn sign_up_works_anonymously() {
        let dir = tempfile::tempdir().unwrap();
        let facade =
            SessionFacade::init(Arc::new(GymApi), CredentialStore::new(dir.path().join("s.json"))).await;
        facade
            .sign_up("Ana", "ana@example.com", "s3cret")
            .await
            .unwrap();
        assert!(facade.current_session().is_anonymous());
    }

    #[tokio::test]
    async fn exercise_decodes_and_ignores_extra_fields() {
        let dir = tempfile::tempdir().unwrap();
        let facade = signed_in(&dir).await;

        let exercise = facade.exercise("12").await.unwrap();
        assert_eq!(exercise.name, "Puxada frontal");
        assert_eq!(exercise.series, 3);
        assert_eq!(exercise.group, "costas");
    }

    #[tokio::test]
    async fn missing_exercise_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let facade = signed_in(&dir).await;

        let err = facade.exercise("99").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.message(), "Exercício não encontrado.");
    }

    #[tokio::test]
    async fn update_account_renames_stored_user() {
        let dir = tempfile::tempdir().unwrap();
        let facade = signed_in(&dir).await;

        facade
            .update_account(&AccountUpdate {
                name: "Ana Maria".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(facade.current_session().user().unwrap().name, "Ana Maria");
    }

    #[tokio::test]
    async fn upload_avatar_stores_server_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let facade = signed_in(&dir).await;

        let file = FilePart::new("ignored", avatar_file_name("Ana Souza", "png"), "image/png", vec![0u8; 64]);
        let user = facade.upload_avatar(file).await.unwrap();

        assert_eq!(user.avatar.as_deref(), Some("8c1f.png"));
        assert_eq!(facade.current_session().user(), Some(&user));
        assert_eq!(
            facade.avatar_url(&user).as_deref(),
            Some("http://10.7.100.7:3333/avatar/8c1f.png")
        );
    }

    #[tokio::test]
    async fn oversized_avatar_rejected_without_request() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new();
        let facade =
            SessionFacade::init(transport.clone(), CredentialStore::new(dir.path().join("s.json"))).await;
        facade.sign_in(EMAIL, PASSWORD).await.unwrap();

        let file = FilePart::new("avatar", "big.png", "image/png", vec![0u8; MAX_AVATAR_BYTES + 1]);
        let err = facade.upload_avatar(file).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(transport.bearers_for("/users/avatar").is_empty());
    }

    #[tokio::test]
    async fn avatar_upload_is_replayed_after_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new();
        let facade =
            SessionFacade::init(transport.clone(), CredentialStore::new(dir.path().join("s.json"))).await;
        facade.sign_in(EMAIL, PASSWORD).await.unwrap();
        transport.expire_access_token();

        let file = FilePart::new("avatar", "ana.png", "image/png", vec![7u8; 32]);
        // The scripted server answers `{"path": ..}`, which is not an avatar body
        let err = facade.upload_avatar(file.clone()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);

        let uploads: Vec<_> = transport
            .seen()
            .into_iter()
            .filter(|(r, _)| r.path == "/users/avatar")
            .collect();
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[1].1.as_deref(), Some("at_2"));
        assert_eq!(uploads[1].0.body, RequestBody::Multipart(vec![file]));
    }

    #[tokio::test]
    async fn register_history_posts_exercise_id() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new();
        let facade =
            SessionFacade::init(transport.clone(), CredentialStore::new(dir.path().join("s.json"))).await;
        facade.sign_in(EMAIL, PASSWORD).await.unwrap();

        facade.register_history("12").await.unwrap();

        let (request, _) = transport.seen().pop().unwrap();
        assert_eq!(request.path, "/history");
        assert_eq!(request.body, RequestBody::Json(serde_json::json!({"exercise_id": "12"})));
    }
}
