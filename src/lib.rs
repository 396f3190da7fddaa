mod commands;
mod config;
mod error;
mod gemini;
mod logging;
mod session;

use std::sync::{Arc, Mutex, MutexGuard};

use tauri::Manager;

use error::AppError;
use gemini::ImageGenerator;
use session::DiagramSession;

/// Shared application state accessible from all Tauri commands.
pub struct AppState {
    /// The current diagramming task. One session at a time; "New Diagram"
    /// resets it rather than allocating a new aggregate.
    session: Mutex<DiagramSession>,
    /// `None` when no API key is configured — commands that need the
    /// generator surface a config error instead of failing at startup.
    generator: Option<Arc<dyn ImageGenerator>>,
}

impl AppState {
    pub fn new(generator: Option<Arc<dyn ImageGenerator>>) -> Self {
        Self {
            session: Mutex::new(DiagramSession::new()),
            generator,
        }
    }

    fn session(&self) -> MutexGuard<'_, DiagramSession> {
        self.session.lock().unwrap()
    }

    fn generator(&self) -> Result<Arc<dyn ImageGenerator>, AppError> {
        self.generator
            .clone()
            .ok_or_else(|| AppError::Config("GEMINI_API_KEY is not set".to_string()))
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    logging::init();
    dotenvy::dotenv().ok();

    tracing::info!("Starting Diagram Tutor v{}", env!("CARGO_PKG_VERSION"));

    let generator: Option<Arc<dyn ImageGenerator>> = match config::GeminiConfig::from_env() {
        Ok(cfg) => match gemini::GeminiClient::new(cfg) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::error!("Failed to build generation client: {}", e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Generation client unavailable: {}", e);
            None
        }
    };

    tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|_app, _argv, _cwd| {}))
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_window_state::Builder::new().build())
        .setup(|app| {
            if let Ok(app_data_dir) = app.path().app_data_dir() {
                logging::install_crash_hook(&app_data_dir);
            }
            Ok(())
        })
        .manage(Arc::new(AppState::new(generator)))
        .invoke_handler(tauri::generate_handler![
            commands::diagram::provide_image,
            commands::diagram::edit_diagram,
            commands::diagram::get_session,
            commands::diagram::new_diagram,
            commands::diagram::set_pending_instruction,
            commands::diagram::save_diagram,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
