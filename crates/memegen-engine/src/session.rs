use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use memegen_contracts::decode::DataUri;
use memegen_contracts::events::{SessionEvent, SessionLog};
use memegen_contracts::status::Notifier;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::{MemeError, Result};
use crate::platform::{meme_file_name, PlatformServices};
use crate::transport::{GenerationRequest, RuntimePlatform, TransportKind, TransportSet};

pub const GENERATED_MESSAGE: &str = "Meme generated successfully!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    Idle,
    Generating,
    Ready,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Ready(String),
    /// The session was reset while the request was in flight.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: GenerationPhase,
    pub template_key: Option<String>,
    pub generated_meme: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct SessionState {
    phase: GenerationPhase,
    template_key: Option<String>,
    image: Option<String>,
    last_error: Option<String>,
    ticket: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: GenerationPhase::Idle,
            template_key: None,
            image: None,
            last_error: None,
            ticket: 0,
        }
    }
}

/// One generate/save/share lifecycle on a fixed runtime platform.
///
/// At most one generation runs at a time. `reset` bumps the ticket so a
/// request still in flight is dropped when it lands.
pub struct GenerationSession {
    platform: RuntimePlatform,
    transports: TransportSet,
    config: ClientConfig,
    notifier: Arc<dyn Notifier>,
    log: Option<SessionLog>,
    state: Mutex<SessionState>,
}

impl GenerationSession {
    pub fn new(
        platform: RuntimePlatform,
        transports: TransportSet,
        config: ClientConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            platform,
            transports,
            config,
            notifier,
            log: None,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Session with the stock transports for `platform`.
    pub fn connect(
        platform: RuntimePlatform,
        config: ClientConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let transports = TransportSet::for_platform(platform, &config)?;
        Ok(Self::new(platform, transports, config, notifier))
    }

    pub fn with_log(mut self, log: SessionLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Appends events to `path` under a fresh session id.
    pub fn with_event_log(self, path: impl Into<PathBuf>) -> Self {
        self.with_log(SessionLog::new(path, Uuid::new_v4().to_string()))
    }

    pub fn session_id(&self) -> Option<&str> {
        self.log.as_ref().map(SessionLog::session_id)
    }

    pub fn platform(&self) -> RuntimePlatform {
        self.platform
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, event: SessionEvent) {
        let Some(log) = &self.log else {
            return;
        };
        if let Err(err) = log.record(&event) {
            warn!("failed writing session event: {err:#}");
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state();
        SessionSnapshot {
            phase: state.phase,
            template_key: state.template_key.clone(),
            generated_meme: state.image.clone(),
            last_error: state.last_error.clone(),
        }
    }

    pub fn phase(&self) -> GenerationPhase {
        self.state().phase
    }

    pub fn generated_meme(&self) -> Option<String> {
        self.state().image.clone()
    }

    /// Runs one generation. Failures move the session to `Failed`, notify, and
    /// are also returned; a second call while one is running is rejected
    /// without touching the state.
    pub fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome> {
        let kind = TransportKind::select(self.platform, !request.images.is_empty());
        let ticket = {
            let mut state = self.state();
            if state.phase == GenerationPhase::Generating {
                return Err(MemeError::GenerationInProgress);
            }
            state.phase = GenerationPhase::Generating;
            state.template_key = Some(request.template_key.clone());
            state.image = None;
            state.last_error = None;
            state.ticket += 1;
            state.ticket
        };
        self.record(SessionEvent::GenerationStarted {
            template_key: request.template_key.clone(),
            transport: kind.name().to_string(),
            images: request.images.len(),
            texts: request.texts.len(),
        });

        let url = self.config.generate_url(&request.template_key);
        let outcome = match self.transports.get(kind) {
            Some(transport) => transport.submit(&url, request),
            None => Err(MemeError::Platform(format!(
                "{kind} upload is unavailable on this platform"
            ))),
        };

        let mut state = self.state();
        if state.ticket != ticket {
            drop(state);
            debug!("discarding stale result for {}", request.template_key);
            self.record(SessionEvent::GenerationDiscarded {
                template_key: request.template_key.clone(),
            });
            return Ok(GenerationOutcome::Discarded);
        }
        match outcome {
            Ok(data_uri) => {
                state.phase = GenerationPhase::Ready;
                state.image = Some(data_uri.clone());
                drop(state);
                let (mime, payload_len) = DataUri::parse(&data_uri)
                    .map(|uri| (uri.mime.to_string(), uri.payload.len()))
                    .unwrap_or_default();
                self.record(SessionEvent::GenerationSucceeded {
                    template_key: request.template_key.clone(),
                    mime,
                    payload_len,
                });
                self.notifier.notify(GENERATED_MESSAGE);
                Ok(GenerationOutcome::Ready(data_uri))
            }
            Err(err) => {
                state.phase = GenerationPhase::Failed;
                state.last_error = Some(err.to_string());
                drop(state);
                error!("generation of {} failed: {err}", request.template_key);
                self.record(SessionEvent::GenerationFailed {
                    template_key: request.template_key.clone(),
                    error: err.to_string(),
                });
                self.notifier.notify(&format!("Generation failed: {err}"));
                Err(err)
            }
        }
    }

    /// Back to `Idle`, dropping the held image and any in-flight result.
    pub fn reset(&self) {
        {
            let mut state = self.state();
            state.ticket += 1;
            state.phase = GenerationPhase::Idle;
            state.template_key = None;
            state.image = None;
            state.last_error = None;
        }
        self.record(SessionEvent::SessionReset);
    }

    pub fn close(&self) {
        self.reset();
    }

    /// Browsers download the image, other hosts save it to the album. Does
    /// nothing while no meme is held.
    pub fn save_meme(&self, services: &dyn PlatformServices) -> Result<Option<PathBuf>> {
        let Some(data_uri) = self.generated_meme() else {
            return Ok(None);
        };
        self.check_runtime(services)?;
        if self.platform.is_browser() {
            let saved = services.trigger_download(&data_uri, &meme_file_name(&data_uri));
            return match saved {
                Ok(path) => {
                    self.record_saved(true, path.as_ref().map(|p| p.display().to_string()));
                    self.notifier.notify("Download started");
                    Ok(path)
                }
                Err(err) => self.save_failed(err),
            };
        }
        match services.save_to_album(&data_uri) {
            Ok(path) => {
                self.record_saved(true, path.as_ref().map(|p| p.display().to_string()));
                self.notifier.notify("Saved to album!");
                Ok(path)
            }
            Err(err) => self.save_failed(err),
        }
    }

    fn check_runtime(&self, services: &dyn PlatformServices) -> Result<()> {
        let runtime = services.runtime();
        if runtime != self.platform {
            return Err(MemeError::Platform(format!(
                "services for {runtime:?} cannot serve a {:?} session",
                self.platform
            )));
        }
        Ok(())
    }

    fn record_saved(&self, ok: bool, detail: Option<String>) {
        self.record(SessionEvent::MemeSaved { ok, detail });
    }

    fn save_failed(&self, err: MemeError) -> Result<Option<PathBuf>> {
        error!("saving meme failed: {err}");
        self.record_saved(false, Some(err.to_string()));
        self.notifier.notify("Save failed, please try again");
        Err(err)
    }

    pub fn share_meme(&self, services: &dyn PlatformServices) -> Result<()> {
        let Some(data_uri) = self.generated_meme() else {
            return Ok(());
        };
        self.check_runtime(services)?;
        match services.share(&data_uri) {
            Ok(()) => {
                self.record(SessionEvent::MemeShared {
                    ok: true,
                    detail: None,
                });
                self.notifier.notify("Shared successfully!");
                Ok(())
            }
            Err(err) => {
                error!("sharing meme failed: {err}");
                self.record(SessionEvent::MemeShared {
                    ok: false,
                    detail: Some(err.to_string()),
                });
                self.notifier.notify("Share failed, please try again");
                Err(err)
            }
        }
    }
}
