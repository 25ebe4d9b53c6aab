use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};

use crate::config::EditorSettings;
use crate::error::{EngineError, EngineResult};
use crate::models::draft::{AssignmentDetails, AuthoringSession, AuthoringSurface, SessionView};
use crate::models::template::Template;
use crate::models::{Assignment, MediaRef};
use crate::services::autosave::Autosaver;
use crate::services::canvas_editor::{CanvasEditor, EditorCommand, EditorEvent, EditorMode};
use crate::services::publish_service::PublishService;
use crate::services::template_library::TemplateLibrary;
use crate::utils::coordinates::NormalizedPoint;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSnapshot {
    pub surface: AuthoringSurface,
    pub mode: EditorMode,
    pub crosshair: NormalizedPoint,
    pub session: SessionView,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub event: EditorEvent,
    #[serde(flatten)]
    pub snapshot: WorkspaceSnapshot,
}

/// One authoring surface: its canvas editor plus the autosaver that keeps
/// its draft.
pub struct AuthoringWorkspace {
    surface: AuthoringSurface,
    editor: Mutex<CanvasEditor>,
    autosaver: Autosaver,
    /// Only touched while `editor` is locked.
    restored: AtomicBool,
    publishing: Mutex<()>,
}

impl AuthoringWorkspace {
    pub fn new(surface: AuthoringSurface, settings: EditorSettings, autosaver: Autosaver) -> Self {
        Self {
            surface,
            editor: Mutex::new(CanvasEditor::new(settings)),
            autosaver,
            restored: AtomicBool::new(false),
            publishing: Mutex::new(()),
        }
    }

    pub fn surface(&self) -> AuthoringSurface {
        self.surface
    }

    pub fn autosaver(&self) -> &Autosaver {
        &self.autosaver
    }

    /// Locks the editor, loading the stored draft first when the surface has
    /// not been mounted yet. Every operation goes through here, so no edit
    /// can land before the restore.
    async fn editor(&self) -> MutexGuard<'_, CanvasEditor> {
        let mut editor = self.editor.lock().await;
        if !self.restored.load(Ordering::SeqCst) {
            let session = self.autosaver.restore().await;
            editor.replace_session(session);
            self.autosaver.cancel_pending();
            self.restored.store(true, Ordering::SeqCst);
        }
        editor
    }

    pub async fn snapshot(&self) -> WorkspaceSnapshot {
        let editor = self.editor().await;
        self.snapshot_of(&editor)
    }

    /// Mounts the surface. Only the first call loads the stored draft; later
    /// calls return the live session.
    pub async fn restore(&self) -> WorkspaceSnapshot {
        self.snapshot().await
    }

    pub async fn update_details(&self, details: AssignmentDetails) -> WorkspaceSnapshot {
        let mut editor = self.editor().await;
        editor.update_details(details);
        self.autosaver.schedule(editor.session().clone());
        self.snapshot_of(&editor)
    }

    pub async fn dispatch(&self, command: EditorCommand) -> EngineResult<CommandResult> {
        let mut editor = self.editor().await;
        let persist = command.mutates_draft();
        let name = command.name();

        let event = editor.apply(command)?;
        if persist && event != EditorEvent::Ignored {
            self.autosaver.schedule(editor.session().clone());
        }

        tracing::debug!("Editor command on {}: {} -> {:?}", self.surface, name, event);

        Ok(CommandResult {
            event,
            snapshot: self.snapshot_of(&editor),
        })
    }

    pub async fn attach_image(&self, image: MediaRef) -> EngineResult<CommandResult> {
        self.dispatch(EditorCommand::LoadImage { image }).await
    }

    pub async fn attach_audio(&self, hotspot_id: &str, audio: MediaRef) -> EngineResult<CommandResult> {
        self.dispatch(EditorCommand::AttachAudio {
            hotspot_id: hotspot_id.to_string(),
            audio,
        })
        .await
    }

    pub async fn session(&self) -> AuthoringSession {
        self.editor().await.session().clone()
    }

    pub async fn save_template(&self, library: &TemplateLibrary, name: &str) -> EngineResult<Template> {
        let session = self.session().await;
        library.save(name, &session).await
    }

    /// Replaces the canvas with the template's image and layout. Details
    /// already typed are kept.
    pub async fn apply_template(&self, library: &TemplateLibrary, template: &Template) -> WorkspaceSnapshot {
        let mut editor = self.editor().await;
        let mut session = library.apply(template);
        session.details = editor.session().details.clone();
        editor.replace_session(session);
        self.autosaver.schedule(editor.session().clone());
        tracing::info!("Template {} applied on {}", template.id, self.surface);
        self.snapshot_of(&editor)
    }

    /// Publishes a snapshot of the current session without holding the
    /// editor, so the surface stays usable during uploads. On success the
    /// canvas is reset unless it was edited meanwhile; on failure the session
    /// and draft are left as they were.
    pub async fn publish(&self, publisher: &PublishService) -> EngineResult<Assignment> {
        let _publishing = self.publishing.try_lock().map_err(|_| {
            EngineError::ConflictingOperation("This assignment is already being published.".to_string())
        })?;

        let session = self.session().await;
        let created = publisher.publish(&session, &self.autosaver).await?;

        let mut editor = self.editor().await;
        if editor.session() == &session {
            editor.replace_session(AuthoringSession::default());
        } else {
            tracing::info!(
                "Session on {} changed while publishing {}, keeping the newer edits",
                self.surface,
                created.id
            );
            self.autosaver.schedule(editor.session().clone());
        }
        Ok(created)
    }

    /// Resets the canvas and deletes the stored draft. A store failure is
    /// logged; the canvas is reset regardless.
    pub async fn discard(&self) -> WorkspaceSnapshot {
        let mut editor = self.editor().await;
        editor.replace_session(AuthoringSession::default());
        if let Err(e) = self.autosaver.clear().await {
            tracing::warn!("PersistenceFailure: draft for {} not deleted: {}", self.surface, e);
        }
        self.snapshot_of(&editor)
    }

    /// Writes the current session immediately, e.g. on shutdown. A surface
    /// that was never mounted has nothing of its own to write.
    pub async fn flush(&self) -> bool {
        let editor = self.editor.lock().await;
        if !self.restored.load(Ordering::SeqCst) || editor.session().is_blank() {
            return false;
        }
        self.autosaver.flush(editor.session()).await
    }

    fn snapshot_of(&self, editor: &CanvasEditor) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            surface: self.surface,
            mode: editor.mode(),
            crosshair: editor.crosshair(),
            session: SessionView::from(editor.session()),
        }
    }
}
