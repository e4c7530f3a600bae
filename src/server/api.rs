use crate::agent::ChatAgent;
use crate::config::persona::{ PersonaSettings, Tone };
use crate::llm::{
    BackendKind,
    GenerationConfig,
    SettingsError,
    MAX_OUTPUT_TOKENS_RANGE,
    TEMPERATURE_RANGE,
    TOP_K_RANGE,
    TOP_P_RANGE,
};
use crate::session::SessionDefaults;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    extract::{ rejection::JsonRejection, State },
    response::{ Html, IntoResponse },
    http::StatusCode,
    Json,
};
use serde::{ Deserialize, Serialize };
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

const INDEX_HTML: &str = include_str!("../../static/index.html");

#[derive(Deserialize, Debug)]
pub struct TestPromptRequest {
    pub backend: BackendKind,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub persona: String,
    #[serde(default)]
    pub tone: Option<String>,
    pub example_query: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TestPromptResponse {
    pub system_prompt: String,
    pub reply: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct BackendOption {
    pub id: BackendKind,
    pub name: String,
    pub model: String,
    pub configured: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SliderRange<T> {
    pub min: T,
    pub max: T,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SliderRanges {
    pub temperature: SliderRange<f32>,
    pub top_p: SliderRange<f32>,
    pub top_k: SliderRange<u32>,
    pub max_output_tokens: SliderRange<u32>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct OptionsResponse {
    pub backends: Vec<BackendOption>,
    pub default_backend: BackendKind,
    pub tones: Vec<String>,
    pub default_tone: Tone,
    pub default_persona: String,
    pub generation: GenerationConfig,
    pub ranges: SliderRanges,
    pub ws_port: Option<u16>,
}

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<ChatAgent>,
    pub defaults: SessionDefaults,
    pub ws_port: Option<u16>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/options", get(options_handler))
        .route("/api/test-prompt", post(test_prompt_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    http_port: u16,
    state: AppState
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    info!("Starting HTTP server on: http://{}", addr);

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
        e
    })?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app.into_make_service()).await {
            error!("HTTP server error: {}", e);
        }
    });

    info!("HTTP server started");
    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn options_handler(State(state): State<AppState>) -> Json<OptionsResponse> {
    let backends = BackendKind::ALL.iter()
        .map(|kind| {
            let client = state.agent.client(*kind);
            BackendOption {
                id: *kind,
                name: kind.display_name().to_string(),
                model: client.map(|c| c.get_model()).unwrap_or_default(),
                configured: client.map(|c| c.is_configured()).unwrap_or(false),
            }
        })
        .collect();

    Json(OptionsResponse {
        backends,
        default_backend: state.defaults.backend.unwrap_or(BackendKind::Gemini),
        tones: Tone::ALL.iter()
            .map(|t| t.name().to_string())
            .collect(),
        default_tone: state.defaults.persona.tone,
        default_persona: state.defaults.persona.persona.clone(),
        generation: state.defaults.generation,
        ranges: SliderRanges {
            temperature: SliderRange { min: TEMPERATURE_RANGE.0, max: TEMPERATURE_RANGE.1 },
            top_p: SliderRange { min: TOP_P_RANGE.0, max: TOP_P_RANGE.1 },
            top_k: SliderRange { min: TOP_K_RANGE.0, max: TOP_K_RANGE.1 },
            max_output_tokens: SliderRange {
                min: MAX_OUTPUT_TOKENS_RANGE.0,
                max: MAX_OUTPUT_TOKENS_RANGE.1,
            },
        },
        ws_port: state.ws_port,
    })
}

fn parse_test_prompt(req: &TestPromptRequest) -> Result<PersonaSettings, SettingsError> {
    req.generation.validate()?;
    let tone = match &req.tone {
        Some(t) => t.parse::<Tone>()?,
        None => Tone::Default,
    };
    Ok(PersonaSettings::new(req.persona.clone(), tone))
}

async fn test_prompt_handler(
    State(state): State<AppState>,
    payload: Result<Json<TestPromptRequest>, JsonRejection>
) -> impl IntoResponse {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => {
            return (
                rejection.status(),
                Json(ErrorResponse { message: rejection.body_text() }),
            ).into_response();
        }
    };
    let persona = match parse_test_prompt(&req) {
        Ok(p) => p,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse { message: e.to_string() }),
            ).into_response();
        }
    };

    info!("Test prompt via {}", req.backend);
    let reply = state.agent.test_prompt(
        &persona,
        &req.example_query,
        &req.generation,
        req.backend
    ).await;

    (
        StatusCode::OK,
        Json(TestPromptResponse {
            system_prompt: persona.system_prompt(),
            reply,
        }),
    ).into_response()
}
