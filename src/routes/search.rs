use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::error;

use crate::models::cafeteria::{self, Cafeteria};
use crate::models::menu::MenuCorpus;
use crate::routes::{api_error, ApiError};
use crate::services::{date, menu_cache::MenuCacheError, search};
use crate::AppState;

fn parse_cafeterias(codes: &str) -> Result<Vec<Cafeteria>, ApiError> {
    cafeteria::decode_list(codes).map_err(|e| api_error(StatusCode::NOT_FOUND, e.to_string()))
}

fn unavailable(e: MenuCacheError) -> ApiError {
    error!("Menu data unavailable: {e}");
    api_error(StatusCode::SERVICE_UNAVAILABLE, "Menu data unavailable")
}

/// GET /json
pub async fn all(State(state): State<AppState>) -> Result<Json<MenuCorpus>, ApiError> {
    let cafeterias = state.config.cafeterias.clone();
    let corpus = state.search.overview(&cafeterias).await.map_err(unavailable)?;
    Ok(Json(corpus))
}

/// GET /json/{cafeterias}
pub async fn by_cafeterias(
    State(state): State<AppState>,
    Path(codes): Path<String>,
) -> Result<Json<MenuCorpus>, ApiError> {
    let cafeterias = parse_cafeterias(&codes)?;
    let corpus = state.search.overview(&cafeterias).await.map_err(unavailable)?;
    Ok(Json(corpus))
}

/// GET /json/{cafeterias}/{*queries}; queries are separated by `/`.
pub async fn by_queries(
    State(state): State<AppState>,
    Path((codes, queries)): Path<(String, String)>,
) -> Result<Json<MenuCorpus>, ApiError> {
    let cafeterias = parse_cafeterias(&codes)?;
    let queries: Vec<String> = queries
        .split('/')
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .collect();
    let corpus = state
        .search
        .search_many(Some(queries.as_slice()), &cafeterias)
        .await
        .map_err(unavailable)?;
    Ok(Json(corpus))
}

async fn on_day(state: &AppState, codes: &str, iso_date: &str) -> Result<Json<MenuCorpus>, ApiError> {
    let cafeterias = parse_cafeterias(codes)?;
    let corpus = state.search.overview(&cafeterias).await.map_err(unavailable)?;
    Ok(Json(search::on_day(&corpus, iso_date)))
}

/// GET /today/{cafeterias}
pub async fn today(
    State(state): State<AppState>,
    Path(codes): Path<String>,
) -> Result<Json<MenuCorpus>, ApiError> {
    on_day(&state, &codes, &date::today()).await
}

/// GET /tomorrow/{cafeterias}
pub async fn tomorrow(
    State(state): State<AppState>,
    Path(codes): Path<String>,
) -> Result<Json<MenuCorpus>, ApiError> {
    on_day(&state, &codes, &date::tomorrow()).await
}

#[cfg(test)]
mod tests {
    use crate::models::cafeteria::Cafeteria;
    use crate::models::menu::MenuCorpus;
    use crate::test_support::{test_state, FakeMenuSite};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn get(site: &FakeMenuSite, tmp: &TempDir, uri: &str) -> (StatusCode, Vec<u8>) {
        let app = crate::router(test_state(site, tmp.path()));
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn site() -> FakeMenuSite {
        let site = FakeMenuSite::start().await;
        site.set_page(Cafeteria::Nordmensa, false, FakeMenuSite::nordmensa_page());
        site
    }

    #[tokio::test]
    async fn test_json_overview() {
        let site = site().await;
        let tmp = TempDir::new().unwrap();
        let (status, body) = get(&site, &tmp, "/json").await;
        assert_eq!(status, StatusCode::OK);
        let corpus: MenuCorpus = serde_json::from_slice(&body).unwrap();
        // cafeterias with no days are left out
        assert_eq!(corpus.keys().collect::<Vec<_>>(), vec!["Nordmensa"]);
        assert_eq!(corpus["Nordmensa"].len(), 2);
    }

    #[tokio::test]
    async fn test_json_queries() {
        let site = site().await;
        let tmp = TempDir::new().unwrap();
        let (status, body) = get(&site, &tmp, "/json/nz/spaghetti/curry").await;
        assert_eq!(status, StatusCode::OK);
        let corpus: MenuCorpus = serde_json::from_slice(&body).unwrap();
        let week = &corpus["Nordmensa"];
        assert_eq!(week["2024-10-14"][0].name, "Spaghetti");
        assert_eq!(week["2024-10-16"].len(), 1);
        assert_eq!(week["2024-10-16"][0].name, "Gemüsecurry");
    }

    #[tokio::test]
    async fn test_unknown_cafeteria_is_404() {
        let site = site().await;
        let tmp = TempDir::new().unwrap();
        let (status, body) = get(&site, &tmp, "/json/nx").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(error["error"].as_str().unwrap().contains('x'));
    }

    #[tokio::test]
    async fn test_today_has_at_most_one_day() {
        let site = site().await;
        let tmp = TempDir::new().unwrap();
        let (status, body) = get(&site, &tmp, "/today/n").await;
        assert_eq!(status, StatusCode::OK);
        let corpus: MenuCorpus = serde_json::from_slice(&body).unwrap();
        for week in corpus.values() {
            assert_eq!(week.keys().collect::<Vec<_>>(), vec![&crate::services::date::today()]);
        }
    }
}
