use std::sync::Arc;
use tauri::State;

use crate::error::AppError;
use crate::session::{EncodedImage, SessionSnapshot};
use crate::AppState;

// ----------------------------------------------------------------------------
// Flow functions
//
// The Tauri commands below are thin wrappers over these so the full
// request lifecycle is testable without a running webview. Locks are
// scoped and never held across an await.
// ----------------------------------------------------------------------------

/// Image Source Collector entry point: install a new original sketch and
/// immediately refine it. Setting the original and starting the refinement
/// are one atomic transition; a busy session ignores the upload.
pub(crate) async fn refine_from_source(
    state: &AppState,
    data_url: &str,
) -> Result<SessionSnapshot, AppError> {
    let image = EncodedImage::from_data_url(data_url)?;
    let generator = state.generator()?;

    let Some(ticket) = state.session().begin_refine(image) else {
        return Ok(state.session().snapshot());
    };

    let outcome = generator
        .refine(&ticket.image)
        .await
        .map_err(|e| e.to_string());

    let mut session = state.session();
    session.complete_refine(ticket.epoch, outcome);
    Ok(session.snapshot())
}

/// Apply a user instruction to the current diagram. Empty instructions and
/// busy sessions are silent no-ops; a failed call leaves the last good
/// image in place.
pub(crate) async fn edit_current(
    state: &AppState,
    instruction: &str,
) -> Result<SessionSnapshot, AppError> {
    let generator = state.generator()?;

    let Some(ticket) = state.session().begin_edit(instruction) else {
        return Ok(state.session().snapshot());
    };

    let outcome = generator
        .edit(&ticket.base, &ticket.instruction)
        .await
        .map_err(|e| e.to_string());

    let mut session = state.session();
    session.complete_edit(ticket.epoch, outcome);
    Ok(session.snapshot())
}

/// Write the current edited diagram to `path`.
pub(crate) async fn save_current(state: &AppState, path: &str) -> Result<(), AppError> {
    let bytes = {
        let session = state.session();
        let image = session
            .edited()
            .ok_or_else(|| AppError::Validation("no edited diagram to save".to_string()))?;
        image.decode()?
    };

    tokio::fs::write(path, bytes).await?;
    tracing::info!(path, "diagram saved");
    Ok(())
}

// ----------------------------------------------------------------------------
// Tauri commands
// ----------------------------------------------------------------------------

#[tauri::command]
pub async fn provide_image(
    state: State<'_, Arc<AppState>>,
    data_url: String,
) -> Result<SessionSnapshot, AppError> {
    refine_from_source(&state, &data_url).await
}

#[tauri::command]
pub async fn edit_diagram(
    state: State<'_, Arc<AppState>>,
    instruction: String,
) -> Result<SessionSnapshot, AppError> {
    edit_current(&state, &instruction).await
}

#[tauri::command]
pub fn get_session(state: State<'_, Arc<AppState>>) -> Result<SessionSnapshot, AppError> {
    Ok(state.session().snapshot())
}

#[tauri::command]
pub fn new_diagram(state: State<'_, Arc<AppState>>) -> Result<SessionSnapshot, AppError> {
    let mut session = state.session();
    session.reset();
    Ok(session.snapshot())
}

/// Voice Transcript Provider sink: store the latest finalized transcript as
/// the proposed instruction (last write wins). Submitting it is still an
/// explicit user action through `edit_diagram`.
#[tauri::command]
pub fn set_pending_instruction(
    state: State<'_, Arc<AppState>>,
    text: String,
) -> Result<SessionSnapshot, AppError> {
    let mut session = state.session();
    session.set_pending_instruction(text);
    Ok(session.snapshot())
}

#[tauri::command]
pub async fn save_diagram(state: State<'_, Arc<AppState>>, path: String) -> Result<(), AppError> {
    save_current(&state, &path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::ImageGenerator;
    use crate::session::Phase;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::oneshot;

    const PNG_URL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn img(tag: &str) -> EncodedImage {
        EncodedImage::new("image/png", tag.to_string())
    }

    /// Generator scripted with a queue of canned outcomes, consumed in order.
    struct ScriptedGenerator {
        outcomes: Mutex<Vec<Result<EncodedImage, AppError>>>,
    }

    impl ScriptedGenerator {
        fn new(outcomes: Vec<Result<EncodedImage, AppError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
            }
        }

        fn next(&self) -> Result<EncodedImage, AppError> {
            let mut outcomes = self.outcomes.lock().unwrap();
            assert!(!outcomes.is_empty(), "unexpected generation call");
            outcomes.remove(0)
        }
    }

    #[async_trait]
    impl ImageGenerator for ScriptedGenerator {
        async fn refine(&self, _image: &EncodedImage) -> Result<EncodedImage, AppError> {
            self.next()
        }

        async fn edit(
            &self,
            _image: &EncodedImage,
            _instruction: &str,
        ) -> Result<EncodedImage, AppError> {
            self.next()
        }
    }

    /// Generator that parks until the test releases it, for interleaving
    /// a reset with an in-flight call.
    struct GatedGenerator {
        gate: tokio::sync::Mutex<Option<oneshot::Receiver<Result<EncodedImage, AppError>>>>,
    }

    #[async_trait]
    impl ImageGenerator for GatedGenerator {
        async fn refine(&self, _image: &EncodedImage) -> Result<EncodedImage, AppError> {
            let rx = self.gate.lock().await.take().expect("gate already consumed");
            rx.await.expect("gate sender dropped")
        }

        async fn edit(
            &self,
            _image: &EncodedImage,
            _instruction: &str,
        ) -> Result<EncodedImage, AppError> {
            unreachable!("test only gates refine calls")
        }
    }

    fn state_with(outcomes: Vec<Result<EncodedImage, AppError>>) -> Arc<AppState> {
        Arc::new(AppState::new(Some(Arc::new(ScriptedGenerator::new(
            outcomes,
        )))))
    }

    #[tokio::test]
    async fn upload_refine_then_chained_edits() {
        let state = state_with(vec![Ok(img("B")), Ok(img("C")), Ok(img("D"))]);

        let snap = refine_from_source(&state, PNG_URL).await.unwrap();
        assert_eq!(snap.phase, Phase::Idle);
        assert_eq!(snap.refined, Some(img("B").to_data_url()));
        assert_eq!(snap.edited, Some(img("B").to_data_url()));

        let snap = edit_current(&state, "make it blue").await.unwrap();
        assert_eq!(snap.edited, Some(img("C").to_data_url()));
        assert_eq!(snap.refined, Some(img("B").to_data_url()));

        let snap = edit_current(&state, "add a label").await.unwrap();
        assert_eq!(snap.edited, Some(img("D").to_data_url()));
        assert_eq!(snap.refined, Some(img("B").to_data_url()));
    }

    #[tokio::test]
    async fn refine_failure_surfaces_prefixed_error() {
        let state = state_with(vec![Err(AppError::Generation(
            "quota exceeded".to_string(),
        ))]);

        let snap = refine_from_source(&state, PNG_URL).await.unwrap();
        assert_eq!(snap.phase, Phase::Idle);
        assert!(snap.refined.is_none());
        assert_eq!(
            snap.last_error.as_deref(),
            Some("Failed to refine diagram. quota exceeded")
        );
    }

    #[tokio::test]
    async fn edit_failure_keeps_last_good_image() {
        let state = state_with(vec![
            Ok(img("B")),
            Err(AppError::Generation("service unavailable".to_string())),
        ]);

        refine_from_source(&state, PNG_URL).await.unwrap();
        let snap = edit_current(&state, "make it blue").await.unwrap();

        assert_eq!(snap.edited, Some(img("B").to_data_url()));
        assert_eq!(
            snap.last_error.as_deref(),
            Some("Failed to edit diagram. service unavailable")
        );
    }

    #[tokio::test]
    async fn empty_instruction_never_calls_the_generator() {
        // Only the refine outcome is scripted; an edit call would panic
        let state = state_with(vec![Ok(img("B"))]);

        refine_from_source(&state, PNG_URL).await.unwrap();
        let snap = edit_current(&state, "   ").await.unwrap();
        assert_eq!(snap.edited, Some(img("B").to_data_url()));
        assert!(snap.last_error.is_none());
    }

    #[tokio::test]
    async fn invalid_data_url_is_a_read_error() {
        let state = state_with(vec![]);
        let err = refine_from_source(&state, "nonsense").await.unwrap_err();
        assert!(matches!(err, AppError::Read(_)));
        // Session untouched
        assert!(state.session().snapshot().original.is_none());
    }

    #[tokio::test]
    async fn missing_api_key_is_a_config_error() {
        let state = Arc::new(AppState::new(None));
        let err = refine_from_source(&state, PNG_URL).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn reset_discards_in_flight_refine_response() {
        let (tx, rx) = oneshot::channel();
        let state = Arc::new(AppState::new(Some(Arc::new(GatedGenerator {
            gate: tokio::sync::Mutex::new(Some(rx)),
        }))));

        let task_state = state.clone();
        let task =
            tokio::spawn(async move { refine_from_source(&task_state, PNG_URL).await });

        // Let the spawned refine reach the gate, then abandon the session
        tokio::time::sleep(Duration::from_millis(20)).await;
        state.session().reset();

        tx.send(Ok(img("B"))).unwrap();
        let snap = task.await.unwrap().unwrap();

        // The late response must not repopulate the cleared session
        assert!(snap.original.is_none());
        assert!(snap.refined.is_none());
        assert!(snap.edited.is_none());
        assert_eq!(snap.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn save_requires_an_edited_diagram() {
        let state = state_with(vec![]);
        let err = save_current(&state, "/tmp/out.png").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn save_writes_decoded_bytes() {
        let state = state_with(vec![Ok(EncodedImage::from_data_url(PNG_URL).unwrap())]);
        refine_from_source(&state, PNG_URL).await.unwrap();

        let dir = std::env::temp_dir().join("diagram-tutor-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("result.png");

        save_current(&state, path.to_str().unwrap()).await.unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
    }
}
