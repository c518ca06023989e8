use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        rejection::FormRejection,
        Extension, Path,
    },
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use chiacchiera_client::{ClientError, PocketBase};
use chiacchiera_core::{
    Conversation, ConversationPatch, CreateUserRequest, LoginForm, Message, RemoveMessageForm,
    SendMessageForm, SignupForm, CONVERSATIONS, USERS,
};
use reqwest::multipart::{Form as UploadForm, Part};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::{
    error::ActionError,
    session::{CurrentUser, RequestSession},
};

/// Campo multiplo dei file, con il modificatore che accoda invece di sostituire.
const PHOTO_APPEND_FIELD: &str = "message_photos+";

/// Handler per GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Handler per POST /{conversation_id}/sendMessage
pub async fn send_message(
    Path(conversation_id): Path<String>,
    CurrentUser(user): CurrentUser,
    Extension(session): Extension<RequestSession>,
    form: Result<Form<SendMessageForm>, FormRejection>,
) -> Result<Redirect, ActionError> {
    let Ok(Form(form)) = form else {
        return Err(ActionError::InvalidMessage);
    };
    let content = form.message.ok_or(ActionError::InvalidMessage)?;
    if content.is_empty() {
        return Err(ActionError::EmptyMessage);
    }

    let mut conversation = fetch_conversation(&session.user, &conversation_id).await?;
    conversation.push_message(Message::text(&user.id, content));
    let patch = ConversationPatch::messages(&conversation.messages);
    save(&session.admin, &conversation.id, &patch).await?;

    info!("{} sent a message in {}", user.id, conversation.id);
    Ok(back_to(&conversation.id))
}

/// Handler per POST /{conversation_id}/sendImage
pub async fn send_image(
    Path(conversation_id): Path<String>,
    CurrentUser(user): CurrentUser,
    Extension(session): Extension<RequestSession>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Redirect, ActionError> {
    let multipart = multipart.map_err(|_| ActionError::InvalidMessage)?;
    let photo = read_photo(multipart).await?;

    let part = photo_part(photo.file_name, photo.content_type.as_deref(), photo.data)?;

    let mut conversation = fetch_conversation(&session.user, &conversation_id).await?;
    let uploaded: Conversation = session
        .admin
        .collection(CONVERSATIONS)
        .update_multipart(&conversation.id, UploadForm::new().part(PHOTO_APPEND_FIELD, part))
        .await?;

    // il backend rinomina il file: il nome vero è quello comparso dopo l'upload
    let file_name = conversation
        .added_photo(&uploaded)
        .ok_or(ActionError::UploadFailed)?
        .to_string();
    debug!("stored photo {file_name} in {}", conversation.id);

    conversation.push_message(Message::image(&user.id, file_name));
    let patch = ConversationPatch::messages(&conversation.messages);
    save(&session.admin, &conversation.id, &patch).await?;

    info!("{} sent an image in {}", user.id, conversation.id);
    Ok(back_to(&conversation.id))
}

/// Handler per POST /{conversation_id}/removeMessage
pub async fn remove_message(
    Path(conversation_id): Path<String>,
    CurrentUser(user): CurrentUser,
    Extension(session): Extension<RequestSession>,
    form: Result<Form<RemoveMessageForm>, FormRejection>,
) -> Result<Redirect, ActionError> {
    let message_id = form
        .ok()
        .and_then(|Form(form)| form.message_id)
        .filter(|id| !id.is_empty())
        .ok_or(ActionError::InvalidMessageId)?;

    let mut conversation = fetch_conversation(&session.user, &conversation_id).await?;
    let removed = conversation.remove_message(&user.id, &message_id)?;

    let mut patch = ConversationPatch::messages(&conversation.messages);
    if removed.is_image() {
        patch = patch.remove_photo(removed.content.as_str());
    }
    save(&session.admin, &conversation.id, &patch).await?;

    info!("{} removed message {} from {}", user.id, removed.id, conversation.id);
    Ok(back_to(&conversation.id))
}

/// Handler per POST /signout
pub async fn signout(Extension(session): Extension<RequestSession>) -> Response {
    let auth = session.user.auth_store();
    if !auth.is_valid() {
        return Json(json!({})).into_response();
    }

    // il middleware esporta lo store vuoto come cookie scaduto
    auth.clear();
    Redirect::to("/signup").into_response()
}

/// Handler per POST /login
pub async fn login(
    Extension(session): Extension<RequestSession>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<Redirect, ActionError> {
    let Ok(Form(form)) = form else {
        return Err(ActionError::InvalidCredentials);
    };
    let (Some(identity), Some(password)) = (non_empty(form.identity), non_empty(form.password))
    else {
        return Err(ActionError::InvalidCredentials);
    };

    match session
        .user
        .collection(USERS)
        .auth_with_password(&identity, &password)
        .await
    {
        Ok(auth) => {
            info!("{} signed in", auth.record["id"].as_str().unwrap_or(&identity));
            Ok(Redirect::to("/"))
        }
        Err(e) if e.status() == Some(400) => Err(ActionError::InvalidCredentials),
        Err(e) => Err(e.into()),
    }
}

/// Handler per POST /signup
pub async fn signup(
    Extension(session): Extension<RequestSession>,
    form: Result<Form<SignupForm>, FormRejection>,
) -> Result<Redirect, ActionError> {
    let form = form.map(|Form(form)| form).unwrap_or_default();
    let (Some(username), Some(email), Some(password), Some(password_confirm)) = (
        non_empty(form.username),
        non_empty(form.email),
        non_empty(form.password),
        non_empty(form.password_confirm),
    ) else {
        return Err(ActionError::InvalidSignup("All fields are required"));
    };
    if password != password_confirm {
        return Err(ActionError::InvalidSignup("Passwords do not match"));
    }

    let users = session.user.collection(USERS);
    let request = CreateUserRequest {
        username,
        email,
        password,
        password_confirm,
    };
    match users.create::<Value, _>(&request).await {
        Ok(_) => {}
        Err(ClientError::Api { status: 400, error }) => {
            return Err(ActionError::Rejected(error.message));
        }
        Err(e) => return Err(e.into()),
    }

    users
        .auth_with_password(&request.username, &request.password)
        .await?;
    info!("{} signed up", request.username);
    Ok(Redirect::to("/"))
}

/// Conversazione letta con le credenziali dell'utente: se le regole del backend non gliela
/// mostrano, per l'utente non esiste.
async fn fetch_conversation(user: &PocketBase, id: &str) -> Result<Conversation, ActionError> {
    // gli id dei record sono alfanumerici; qualsiasi altra cosa non può esistere e non
    // deve finire nell'header Location
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(ActionError::ConversationNotFound);
    }

    user.collection(CONVERSATIONS)
        .get_one(id)
        .await
        .map_err(|e| {
            if e.is_not_found() {
                ActionError::ConversationNotFound
            } else {
                e.into()
            }
        })
}

// scrittura privilegiata: le regole della collection non permettono all'utente di modificarla
async fn save(
    admin: &PocketBase,
    id: &str,
    patch: &ConversationPatch<'_>,
) -> Result<(), ActionError> {
    admin
        .collection(CONVERSATIONS)
        .update::<Value, _>(id, patch)
        .await?;
    Ok(())
}

struct Photo {
    file_name: String,
    content_type: Option<String>,
    data: Vec<u8>,
}

// Cerca il campo "photo": deve essere un file non vuoto
async fn read_photo(mut multipart: Multipart) -> Result<Photo, ActionError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ActionError::InvalidMessage)?
    {
        if field.name() != Some("photo") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or(ActionError::InvalidMessage)?;
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|_| ActionError::InvalidMessage)?;
        if data.is_empty() {
            return Err(ActionError::InvalidMessage);
        }

        return Ok(Photo {
            file_name,
            content_type,
            data: data.to_vec(),
        });
    }
    Err(ActionError::InvalidMessage)
}

/// Parte multipart per l'upload. Il content type arriva dal browser: se non è valido
/// il messaggio è invalido.
pub fn photo_part(
    file_name: String,
    content_type: Option<&str>,
    data: Vec<u8>,
) -> Result<Part, ActionError> {
    let part = Part::bytes(data).file_name(file_name);
    match content_type {
        Some(content_type) => part
            .mime_str(content_type)
            .map_err(|_| ActionError::InvalidMessage),
        None => Ok(part),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn back_to(conversation_id: &str) -> Redirect {
    Redirect::to(&format!("/{conversation_id}"))
}
