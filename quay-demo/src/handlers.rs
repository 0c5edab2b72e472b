use std::sync::Arc;

use quay::prelude::*;
use serde_json::{Value, json};

use crate::store::{Note, NoteStore};

#[derive(Debug, Deserialize)]
pub struct NewNote {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

fn store(state: &AppState) -> Result<&NoteStore> {
    state
        .get::<Arc<NoteStore>>()
        .map(|store| store.as_ref())
        .ok_or_else(|| Error::internal("note store is not registered"))
}

pub async fn index(state: Arc<AppState>) -> Result<Json<Value>> {
    let config = state
        .get::<AppConfig>()
        .ok_or_else(|| Error::internal("configuration is not registered"))?;

    Ok(Json(json!({
        "status": "ok",
        "name": config.name,
        "testing": config.testing,
    })))
}

pub async fn list_notes(state: Arc<AppState>) -> Result<Json<Vec<Note>>> {
    Ok(Json(store(&state)?.list()))
}

pub async fn create_note(
    req: Request,
    params: PathParams,
    state: Arc<AppState>,
) -> Result<(StatusCode, Json<Note>)> {
    let Json(input) = Json::<NewNote>::from_request(req, &params, &state).await?;

    let title = input.title.trim();
    if title.is_empty() {
        return Err(Error::validation("title must not be blank")
            .with_details(json!({"field": "title"})));
    }

    let note = store(&state)?.insert(title.to_string(), input.body);
    tracing::debug!(id = note.id, "note created");
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn get_note(
    req: Request,
    params: PathParams,
    state: Arc<AppState>,
) -> Result<Json<Note>> {
    let Path(id) = Path::<u64>::from_request(req, &params, &state).await?;

    store(&state)?
        .get(id)
        .map(Json)
        .ok_or_else(|| Error::not_found(format!("note {} not found", id)))
}

pub async fn delete_note(
    req: Request,
    params: PathParams,
    state: Arc<AppState>,
) -> Result<StatusCode> {
    let Path(id) = Path::<u64>::from_request(req, &params, &state).await?;

    match store(&state)?.remove(id) {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(Error::not_found(format!("note {} not found", id))),
    }
}
