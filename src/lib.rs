mod api_client;
mod classifier;
mod config;
mod controller;
mod error;
mod formatter;
mod hotkey;
mod models;
mod scheduler;
mod tray;
mod window;

use std::sync::Arc;

use log::{error, info, warn};
use models::{AppConfig, DisplayState, PollPhase};
use tauri::Manager;
use tokio::sync::{Mutex, RwLock};

pub struct SharedState {
    pub config: Arc<RwLock<AppConfig>>,
    pub display: Arc<RwLock<DisplayState>>,
    pub runtime: Arc<Mutex<scheduler::OverlayRuntime>>,
}

#[tauri::command]
async fn get_display_state(state: tauri::State<'_, SharedState>) -> Result<DisplayState, String> {
    Ok(state.display.read().await.clone())
}

#[tauri::command]
async fn toggle_view(app: tauri::AppHandle) -> Result<(), String> {
    toggle_view_internal(app).await
}

#[tauri::command]
async fn refresh_schedule(app: tauri::AppHandle) -> Result<(), String> {
    refresh_schedule_internal(app).await
}

#[tauri::command]
async fn get_poll_phase(state: tauri::State<'_, SharedState>) -> Result<PollPhase, String> {
    Ok(state.runtime.lock().await.poll_phase())
}

pub async fn start_overlay_internal(app: tauri::AppHandle) -> Result<(), String> {
    let state = app.state::<SharedState>();
    let config = state.config.read().await.clone();

    let client = api_client::ApiClient::new(&config)?;
    info!("starting overlay against {}", client.url());

    let surface = window::OverlaySurface::new(app.clone(), state.display.clone());
    let timing = scheduler::PollTiming::from_config(&config);

    let mut runtime = state.runtime.lock().await;
    if runtime.is_running() {
        info!("overlay runtime already running, restarting");
    }
    runtime
        .start(Arc::new(client), Arc::new(surface), timing)
        .await;
    Ok(())
}

pub async fn toggle_view_internal(app: tauri::AppHandle) -> Result<(), String> {
    let state = app.state::<SharedState>();
    let runtime = state.runtime.lock().await;
    runtime.toggle_view().await
}

pub async fn refresh_schedule_internal(app: tauri::AppHandle) -> Result<(), String> {
    info!("manual schedule refresh requested");
    let state = app.state::<SharedState>();
    let runtime = state.runtime.lock().await;
    runtime.refresh_now()
}

/// Stops timers and the hotkey listener before the window goes away.
pub async fn shutdown_internal(app: tauri::AppHandle) {
    info!("shutting down overlay");
    {
        let state = app.state::<SharedState>();
        let mut runtime = state.runtime.lock().await;
        runtime.stop().await;
    }

    if let Err(err) = hotkey::unregister_all(&app) {
        warn!("{}", err);
    }

    app.exit(0);
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let _ = env_logger::builder().is_test(false).try_init();

    tauri::Builder::default()
        .setup(|app| {
            // Single-instance plugin must be registered first
            #[cfg(desktop)]
            {
                app.handle().plugin(tauri_plugin_single_instance::init(|_app, _args, _cwd| {
                    info!("second instance launch ignored; overlay already running");
                }))?;
            }

            let app_handle = app.handle().clone();
            let initial_config = tauri::async_runtime::block_on(async {
                match config::load_config(&app_handle).await {
                    Ok(cfg) => cfg,
                    Err(err) => {
                        error!("failed to load persisted config, using defaults: {}", err);
                        AppConfig::default()
                    }
                }
            });

            app.manage(SharedState {
                config: Arc::new(RwLock::new(initial_config.clone())),
                display: Arc::new(RwLock::new(DisplayState::default())),
                runtime: Arc::new(Mutex::new(scheduler::OverlayRuntime::new())),
            });

            app.handle().plugin(hotkey::plugin())?;

            window::create_overlay_window(&app_handle, &initial_config.window)?;
            tray::setup_tray(&app_handle)?;

            let startup_handle = app_handle.clone();
            let toggle_hotkey = initial_config.toggle_hotkey.clone();
            tauri::async_runtime::spawn(async move {
                if let Err(err) = start_overlay_internal(startup_handle.clone()).await {
                    error!("overlay failed to start: {}", err);
                    return;
                }
                // Presses only reach the view once the render task exists.
                if let Err(err) = hotkey::register(&startup_handle, &toggle_hotkey) {
                    warn!("view toggle hotkey unavailable: {}", err);
                }
            });

            Ok(())
        })
        .on_window_event(|window, event| {
            if let tauri::WindowEvent::CloseRequested { api, .. } = event {
                api.prevent_close();
                let app_handle = window.app_handle().clone();
                tauri::async_runtime::spawn(async move {
                    shutdown_internal(app_handle).await;
                });
            }
        })
        .invoke_handler(tauri::generate_handler![
            get_display_state,
            toggle_view,
            refresh_schedule,
            get_poll_phase
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
