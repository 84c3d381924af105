use serde_json::{Value, json};

use super::args::{
    CreateNoteArgs, DeleteNoteArgs, FieldError, GetNoteArgs, SearchNotesArgs, UpdateNoteArgs,
    parse,
};
use super::{Tool, ToolFailure};
use crate::application::notes::NoteStore;
use async_trait::async_trait;

pub struct SearchNotes;
pub struct GetNote;
pub struct CreateNote;
pub struct UpdateNote;
pub struct DeleteNote;

#[async_trait]
impl Tool for SearchNotes {
    fn name(&self) -> &'static str {
        "search_notes"
    }

    fn description(&self) -> &'static str {
        "Search notes by keyword in title/content. Returns an id/title/snippet list."
    }

    fn arg_fields(&self) -> &'static [&'static str] {
        &["query", "limit"]
    }

    fn check_args(&self, args: &Value) -> Result<(), Vec<FieldError>> {
        parse::<SearchNotesArgs>(args).map(|_| ())
    }

    async fn run(&self, store: &NoteStore, args: Value) -> Result<Value, ToolFailure> {
        let args: SearchNotesArgs = parse(&args).map_err(decode_failure)?;
        let results = store.search(&args.query, args.limit as usize).await;
        Ok(json!({ "results": results }))
    }
}

#[async_trait]
impl Tool for GetNote {
    fn name(&self) -> &'static str {
        "get_note"
    }

    fn description(&self) -> &'static str {
        "Get a note by id."
    }

    fn arg_fields(&self) -> &'static [&'static str] {
        &["note_id"]
    }

    fn check_args(&self, args: &Value) -> Result<(), Vec<FieldError>> {
        parse::<GetNoteArgs>(args).map(|_| ())
    }

    async fn run(&self, store: &NoteStore, args: Value) -> Result<Value, ToolFailure> {
        let args: GetNoteArgs = parse(&args).map_err(decode_failure)?;
        let note = store.get(args.note_id).await?;
        Ok(json!({ "note": note }))
    }
}

#[async_trait]
impl Tool for CreateNote {
    fn name(&self) -> &'static str {
        "create_note"
    }

    fn description(&self) -> &'static str {
        "Create a note with title/content."
    }

    fn arg_fields(&self) -> &'static [&'static str] {
        &["title", "content"]
    }

    fn check_args(&self, args: &Value) -> Result<(), Vec<FieldError>> {
        parse::<CreateNoteArgs>(args).map(|_| ())
    }

    async fn run(&self, store: &NoteStore, args: Value) -> Result<Value, ToolFailure> {
        let args: CreateNoteArgs = parse(&args).map_err(decode_failure)?;
        let note = store.create(args.title, args.content).await;
        Ok(json!({ "note": note }))
    }
}

#[async_trait]
impl Tool for UpdateNote {
    fn name(&self) -> &'static str {
        "update_note"
    }

    fn description(&self) -> &'static str {
        "Partially update a note by id (title/content optional)."
    }

    fn arg_fields(&self) -> &'static [&'static str] {
        &["note_id", "title", "content"]
    }

    fn check_args(&self, args: &Value) -> Result<(), Vec<FieldError>> {
        parse::<UpdateNoteArgs>(args).map(|_| ())
    }

    async fn run(&self, store: &NoteStore, args: Value) -> Result<Value, ToolFailure> {
        let args: UpdateNoteArgs = parse(&args).map_err(decode_failure)?;
        let note = store.patch(args.note_id, args.title, args.content).await?;
        Ok(json!({ "note": note }))
    }
}

#[async_trait]
impl Tool for DeleteNote {
    fn name(&self) -> &'static str {
        "delete_note"
    }

    fn description(&self) -> &'static str {
        "Delete a note by id."
    }

    fn arg_fields(&self) -> &'static [&'static str] {
        &["note_id"]
    }

    fn check_args(&self, args: &Value) -> Result<(), Vec<FieldError>> {
        parse::<DeleteNoteArgs>(args).map(|_| ())
    }

    async fn run(&self, store: &NoteStore, args: Value) -> Result<Value, ToolFailure> {
        let args: DeleteNoteArgs = parse(&args).map_err(decode_failure)?;
        store.delete(args.note_id).await?;
        Ok(json!({ "deleted": true, "note_id": args.note_id }))
    }
}

// Dispatch has already validated the args; hitting this means the two
// validation passes disagree, which is an execution bug worth surfacing.
fn decode_failure(errors: Vec<FieldError>) -> ToolFailure {
    let rendered = errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ");
    ToolFailure::Failed(format!("argument decode failed after validation: {rendered}"))
}
