use crate::config::AppConfig;
use crate::html::{index_page, PageSources};
use crate::layer::{Layer, MouseButton, PointerEvent};
use crate::map::MapView;
use crate::render::{layer_manifest, LayerInfo};
use crate::switcher::{LayerSwitcher, SwitchError};
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use geo::algorithm::contains::Contains;
use geo::bounding_rect::BoundingRect;
use geo::Point;
use geojson::FeatureCollection;
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{info, warn};

// Wrapper for RTree indexing
pub struct FeatureIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for FeatureIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Switcher and map state mutated by interaction requests.
pub struct ViewState {
    pub switcher: LayerSwitcher,
    pub map: MapView,
}

pub struct AppState {
    pub layers: Vec<Layer>,
    pub geometries: Vec<Option<geo::Geometry<f64>>>,
    pub tree: RTree<FeatureIndex>,
    pub config: AppConfig,
    pub view: Mutex<ViewState>,
}

impl AppState {
    pub fn new(config: AppConfig, layers: Vec<Layer>) -> Self {
        // Every layer views the same features, so one index serves them all.
        let features = layers.first().map(Layer::features).unwrap_or_default();
        let geometries: Vec<Option<geo::Geometry<f64>>> = features
            .iter()
            .map(|f| {
                f.geometry
                    .as_ref()
                    .and_then(|g| g.value.clone().try_into().ok())
            })
            .collect();

        let tree_items: Vec<FeatureIndex> = geometries
            .iter()
            .enumerate()
            .filter_map(|(index, geometry)| {
                let rect = geometry.as_ref()?.bounding_rect()?;
                Some(FeatureIndex {
                    index,
                    aabb: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();
        let tree = RTree::bulk_load(tree_items);

        let switcher = LayerSwitcher::new(&config.switcher, &config.schema);
        let mut map = MapView::default();
        switcher.init(&mut map);

        Self {
            layers,
            geometries,
            tree,
            config,
            view: Mutex::new(ViewState { switcher, map }),
        }
    }

    fn layer(&self, code: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.code() == code)
    }

    fn view(&self) -> MutexGuard<'_, ViewState> {
        // A panic while holding the lock leaves plain data behind; keep serving.
        self.view.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Index of the first feature containing the point.
    pub fn hit(&self, point: Point<f64>) -> Option<usize> {
        let envelope = AABB::from_point([point.x(), point.y()]);
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|candidate| {
                self.geometries
                    .get(candidate.index)
                    .and_then(Option::as_ref)
                    .is_some_and(|g| g.contains(&point))
            })
            .map(|candidate| candidate.index)
            .collect();
        hits.sort_unstable();
        hits.first().copied()
    }
}

#[derive(Deserialize)]
pub struct QueryParams {
    layer: String,
    lat: f64,
    lon: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct QueryResponse {
    layer: String,
    feature: usize,
    /// `[lat, lon]`, ready for Leaflet.
    anchor: Option<[f64; 2]>,
    html: String,
}

#[derive(Deserialize)]
pub struct SelectRequest {
    category: Option<String>,
    group: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SelectResponse {
    attached: Vec<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let files = ServeDir::new(state.config.output_dir());
    Router::new()
        .route("/", get(index_handler))
        .route("/api/layers", get(layers_handler))
        .route("/api/layers/{code}", get(layer_handler))
        .route("/api/control", get(control_handler))
        .route("/api/select", post(select_handler))
        .route("/api/query", get(query_handler))
        .nest_service("/files", files)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, layers: Vec<Layer>) -> Result<()> {
    info!("Building spatial index for API...");
    let port = config.server.port;
    let state = Arc::new(AppState::new(config, layers));
    info!(features = state.geometries.len(), "Spatial index built");

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(index_page(
        &state.config.map,
        state.config.style.hover_highlight,
        &PageSources::api(),
    ))
}

async fn layers_handler(State(state): State<Arc<AppState>>) -> Json<Vec<LayerInfo>> {
    let view = state.view();
    Json(layer_manifest(&state.layers, &view.switcher, &view.map))
}

async fn layer_handler(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<FeatureCollection>, StatusCode> {
    state
        .layer(&code)
        .map(|layer| Json(layer.to_geojson()))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn control_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    let view = state.view();
    Html(
        view.switcher
            .render_control(&state.config.schema, &state.config.map.sidebar_id),
    )
}

async fn select_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SelectRequest>,
) -> Result<Json<SelectResponse>, (StatusCode, String)> {
    let mut guard = state.view();
    let view = &mut *guard;

    let result = match (&request.category, &request.group) {
        (Some(code), _) if !code.is_empty() => view.switcher.select(&mut view.map, code),
        (_, Some(group)) => view.switcher.clear(&mut view.map, group),
        _ => Err(SwitchError::SelectionRequired),
    };

    match result {
        Ok(()) => Ok(Json(SelectResponse {
            attached: view.map.attached().to_vec(),
        })),
        Err(err) => {
            warn!(error = %err, "Rejected layer selection");
            let status = match err {
                SwitchError::SelectionRequired => StatusCode::CONFLICT,
                _ => StatusCode::NOT_FOUND,
            };
            Err((status, err.to_string()))
        }
    }
}

/// Primary click at a map position on one layer. Returns the popup the click
/// opened, or `None` when it landed on the background.
async fn query_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Option<QueryResponse>>, StatusCode> {
    let layer = state.layer(&params.layer).ok_or(StatusCode::NOT_FOUND)?;
    let point = Point::new(params.lon, params.lat);
    let mut view = state.view();

    match state.hit(point) {
        Some(index) => {
            let event = PointerEvent::Click {
                button: MouseButton::Primary,
                at: Some(point),
            };
            view.map.dispatch(layer, index, &event);
        }
        None => view.map.click_background(),
    }

    Ok(Json(view.map.popup().map(|popup| QueryResponse {
        layer: popup.layer.clone(),
        feature: popup.feature,
        anchor: popup.anchor.map(|p| [p.y(), p.x()]),
        html: popup.html.clone(),
    })))
}
