//! HTTP front for the chat widget. Each open widget is a session held in
//! memory; the page polls or posts and renders the returned snapshot.

use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use chrono::FixedOffset;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::conversation::ConversationState;
use crate::dialogue::{DialogueController, DEFAULT_MAX_LATENCY, DEFAULT_MIN_LATENCY};
use crate::error::DialogueError;
use crate::knowledge::KnowledgeBase;
use crate::selection::SeededSelector;
use crate::timing::{ResponseDelay, TypingDelay};

#[derive(Deserialize)]
struct OpenRequest {
    display_name: Option<String>,
}

#[derive(Serialize)]
struct OpenResponse {
    session_id: Uuid,
    state: ConversationState,
}

#[derive(Deserialize)]
struct TextRequest {
    text: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct ReloadResponse {
    name: String,
    topics: usize,
}

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

struct SessionSlot {
    controller: Arc<DialogueController>,
    last_seen: Mutex<Instant>,
}

/// Shared by every worker.
pub struct AppState {
    knowledge: RwLock<Arc<KnowledgeBase>>,
    knowledge_file: Option<PathBuf>,
    sessions: RwLock<HashMap<Uuid, SessionSlot>>,
    delay: Arc<dyn ResponseDelay>,
    utc_offset: FixedOffset,
    seed: Option<u64>,
    idle_timeout: Duration,
}

impl AppState {
    pub fn new(knowledge: Arc<KnowledgeBase>, utc_offset: FixedOffset) -> Self {
        Self {
            knowledge: RwLock::new(knowledge),
            knowledge_file: None,
            sessions: RwLock::new(HashMap::new()),
            delay: Arc::new(TypingDelay::new(DEFAULT_MIN_LATENCY, DEFAULT_MAX_LATENCY, None)),
            utc_offset,
            seed: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_delay(mut self, delay: Arc<dyn ResponseDelay>) -> Self {
        self.delay = delay;
        self
    }

    /// Makes every new session's variant selection reproducible.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_knowledge_file(mut self, path: Option<PathBuf>) -> Self {
        self.knowledge_file = path;
        self
    }

    /// Sessions untouched for this long are dropped by `evict_idle`.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn knowledge(&self) -> Arc<KnowledgeBase> {
        self.knowledge.read().clone()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn open_session(&self, display_name: Option<String>) -> (Uuid, Arc<DialogueController>) {
        let id = Uuid::new_v4();
        let selector = match self.seed {
            Some(seed) => SeededSelector::new(seed),
            None => SeededSelector::from_entropy(),
        };
        let controller = Arc::new(
            DialogueController::new(self.knowledge())
                .with_delay(self.delay.clone())
                .with_selector(Box::new(selector))
                .with_utc_offset(self.utc_offset)
                .with_display_name(display_name),
        );
        controller.open();
        self.sessions.write().insert(
            id,
            SessionSlot {
                controller: controller.clone(),
                last_seen: Mutex::new(Instant::now()),
            },
        );
        log::info!("Session {} opened ({} active)", id, self.session_count());
        (id, controller)
    }

    /// Looks a session up and marks it as active.
    pub fn session(&self, id: &Uuid) -> Option<Arc<DialogueController>> {
        let sessions = self.sessions.read();
        let slot = sessions.get(id)?;
        *slot.last_seen.lock() = Instant::now();
        Some(slot.controller.clone())
    }

    pub fn close_session(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().remove(id);
        match removed {
            Some(slot) => {
                slot.controller.close();
                log::info!("Session {} closed", id);
                true
            }
            None => false,
        }
    }

    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    /// Closes and drops every session idle for at least the timeout as of
    /// `now`. Sessions with a reply in flight are kept.
    pub fn evict_idle_at(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write();
        let idle: Vec<Uuid> = sessions
            .iter()
            .filter(|(_, slot)| {
                now.saturating_duration_since(*slot.last_seen.lock()) >= self.idle_timeout
                    && !slot.controller.snapshot().is_awaiting_response()
            })
            .map(|(id, _)| *id)
            .collect();
        for id in &idle {
            if let Some(slot) = sessions.remove(id) {
                slot.controller.close();
            }
        }
        if !idle.is_empty() {
            log::info!(
                "Evicted {} idle session(s) ({} active)",
                idle.len(),
                sessions.len()
            );
        }
        idle.len()
    }

    /// Re-reads the configured knowledge file. Sessions already open keep
    /// the table they started with.
    pub fn reload_knowledge(&self) -> anyhow::Result<Arc<KnowledgeBase>> {
        let path = self
            .knowledge_file
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No knowledge_file configured; built-in tables cannot be reloaded"))?;
        let fresh = Arc::new(KnowledgeBase::load(path)?);
        *self.knowledge.write() = fresh.clone();
        log::info!("Reloaded knowledge base '{}' ({} topics)", fresh.name(), fresh.len());
        Ok(fresh)
    }
}

fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse {
        error: "unknown session".to_string(),
    })
}

fn dialogue_error(err: DialogueError, controller: &DialogueController) -> HttpResponse {
    match err {
        // Ignored input is not a failure, the widget just shows the same state.
        DialogueError::EmptyInput => HttpResponse::Ok().json(controller.snapshot()),
        DialogueError::ConcurrentSubmission => HttpResponse::Conflict().json(ErrorResponse {
            error: err.to_string(),
        }),
        DialogueError::SessionClosed => HttpResponse::Gone().json(ErrorResponse {
            error: err.to_string(),
        }),
    }
}

enum Submission {
    Text(String),
    Suggestion(String),
}

async fn run_submission(controller: Arc<DialogueController>, submission: Submission) -> HttpResponse {
    // Spawned so the reply still lands if the client goes away mid-pause.
    let task = {
        let controller = controller.clone();
        actix_web::rt::spawn(async move {
            match submission {
                Submission::Text(text) => controller.submit(&text).await,
                Submission::Suggestion(label) => controller.select_suggestion(&label).await,
            }
        })
    };
    match task.await {
        Ok(Ok(())) => HttpResponse::Ok().json(controller.snapshot()),
        Ok(Err(err)) => dialogue_error(err, &controller),
        Err(err) => {
            log::error!("Submission task failed: {}", err);
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(include_str!("index.html"))
}

#[post("/sessions")]
async fn open_session(
    req: Option<web::Json<OpenRequest>>,
    data: web::Data<AppState>,
) -> impl Responder {
    let display_name = req.and_then(|r| r.into_inner().display_name);
    let (session_id, controller) = data.open_session(display_name);
    HttpResponse::Created().json(OpenResponse {
        session_id,
        state: controller.snapshot(),
    })
}

#[get("/sessions/{id}")]
async fn get_session(path: web::Path<Uuid>, data: web::Data<AppState>) -> impl Responder {
    match data.session(&path) {
        Some(controller) => HttpResponse::Ok().json(controller.snapshot()),
        None => not_found(),
    }
}

#[post("/sessions/{id}/messages")]
async fn post_message(
    path: web::Path<Uuid>,
    req: web::Json<TextRequest>,
    data: web::Data<AppState>,
) -> impl Responder {
    match data.session(&path) {
        Some(controller) => run_submission(controller, Submission::Text(req.into_inner().text)).await,
        None => not_found(),
    }
}

#[post("/sessions/{id}/suggestions")]
async fn post_suggestion(
    path: web::Path<Uuid>,
    req: web::Json<TextRequest>,
    data: web::Data<AppState>,
) -> impl Responder {
    match data.session(&path) {
        Some(controller) => {
            run_submission(controller, Submission::Suggestion(req.into_inner().text)).await
        }
        None => not_found(),
    }
}

#[put("/sessions/{id}/draft")]
async fn put_draft(
    path: web::Path<Uuid>,
    req: web::Json<TextRequest>,
    data: web::Data<AppState>,
) -> impl Responder {
    let Some(controller) = data.session(&path) else {
        return not_found();
    };
    match controller.set_draft(&req.text) {
        Ok(()) => HttpResponse::Ok().json(controller.snapshot()),
        Err(err) => dialogue_error(err, &controller),
    }
}

#[post("/sessions/{id}/minimize")]
async fn toggle_minimized(path: web::Path<Uuid>, data: web::Data<AppState>) -> impl Responder {
    let Some(controller) = data.session(&path) else {
        return not_found();
    };
    match controller.toggle_minimized() {
        Ok(_) => HttpResponse::Ok().json(controller.snapshot()),
        Err(err) => dialogue_error(err, &controller),
    }
}

#[delete("/sessions/{id}")]
async fn close_session(path: web::Path<Uuid>, data: web::Data<AppState>) -> impl Responder {
    if data.close_session(&path) {
        HttpResponse::NoContent().finish()
    } else {
        not_found()
    }
}

#[post("/knowledge/reload")]
async fn reload_knowledge(data: web::Data<AppState>) -> impl Responder {
    match data.reload_knowledge() {
        Ok(kb) => HttpResponse::Ok().json(ReloadResponse {
            name: kb.name().to_string(),
            topics: kb.len(),
        }),
        Err(err) => {
            log::error!("Knowledge reload failed: {:#}", err);
            HttpResponse::BadRequest().json(ErrorResponse {
                error: format!("{:#}", err),
            })
        }
    }
}

/// Registers every route; shared by the binary and the integration tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(open_session)
        .service(get_session)
        .service(post_message)
        .service(post_suggestion)
        .service(put_draft)
        .service(toggle_minimized)
        .service(close_session)
        .service(reload_knowledge);
}
