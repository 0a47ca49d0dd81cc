// src/server/mod.rs
use percent_encoding::percent_decode_str;
use serde::Serialize;
use std::{convert::Infallible, sync::Arc};
use tracing::{error, info, instrument};
use warp::{
    filters::BoxedFilter,
    http::StatusCode,
    reply::{self, Response},
    Filter, Rejection, Reply,
};

use crate::fetch::SheetSource;
use crate::query::{QueryError, QueryOutput, QueryRequest, Result};
use crate::table::TableSnapshot;

pub const SERVICE_NAME: &str = "sheetquery";

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Validate, fetch, build, execute. One independent pass per call.
#[instrument(level = "info", skip(source))]
pub async fn run_query(source: &dyn SheetSource, request: &QueryRequest) -> Result<QueryOutput> {
    request.validate()?;
    let raw = source.fetch_raw_table().await.map_err(QueryError::Fetch)?;
    let snapshot = TableSnapshot::build(Some(raw));
    request.execute(&snapshot)
}

fn error_reply(err: &QueryError) -> Response {
    let message = match err {
        QueryError::Fetch(cause) => {
            error!(error = ?cause, "Error fetching data from Google Sheets API");
            "Internal Server Error".to_string()
        }
        other => {
            info!(error = %other, "request rejected");
            other.to_string()
        }
    };
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    reply::with_status(reply::json(&ErrorResponse { error: message }), status).into_response()
}

async fn handle(
    source: Arc<dyn SheetSource>,
    request: QueryRequest,
) -> std::result::Result<Response, Infallible> {
    Ok(match run_query(source.as_ref(), &request).await {
        Ok(out) => reply::json(&out).into_response(),
        Err(e) => error_reply(&e),
    })
}

async fn health_check() -> std::result::Result<Response, Rejection> {
    Ok(reply::json(&serde_json::json!({
        "status": "healthy",
        "service": SERVICE_NAME
    }))
    .into_response())
}

async fn handle_rejection(err: Rejection) -> std::result::Result<Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
    } else {
        error!(rejection = ?err, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    };
    Ok(reply::with_status(
        reply::json(&ErrorResponse {
            error: message.to_string(),
        }),
        status,
    )
    .into_response())
}

/// Path segments arrive still percent-encoded.
fn decode(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

fn with_source(
    source: Arc<dyn SheetSource>,
) -> impl Filter<Extract = (Arc<dyn SheetSource>,), Error = Infallible> + Clone {
    warp::any().map(move || source.clone())
}

/// Matches each `/`-separated segment of `api_prefix`; empty matches anything.
fn prefix(api_prefix: &str) -> BoxedFilter<()> {
    api_prefix
        .split('/')
        .filter(|seg| !seg.is_empty())
        .fold(warp::any().boxed(), |acc, seg| {
            acc.and(warp::path(seg.to_string())).boxed()
        })
}

/// Distinct list at `/{name}`, equality filter at `/{name}/{value}`.
fn column_routes(
    api: BoxedFilter<()>,
    source: Arc<dyn SheetSource>,
    segment: &'static str,
    column: &'static str,
) -> BoxedFilter<(Response,)> {
    let distinct = api
        .clone()
        .and(warp::path(segment))
        .and(warp::path::end())
        .and(with_source(source.clone()))
        .and_then(move |src| handle(src, QueryRequest::distinct(column)));

    let by_value = api
        .and(warp::path(segment))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(with_source(source))
        .and_then(move |value: String, src| {
            handle(src, QueryRequest::equality(column, decode(&value)))
        });

    distinct.or(by_value).unify().boxed()
}

/// Distinct `child` values at `/{parent_segment}/{value}/{child_segment}`.
fn nested_route(
    api: BoxedFilter<()>,
    source: Arc<dyn SheetSource>,
    (parent_segment, parent_column): (&'static str, &'static str),
    (child_segment, child_column): (&'static str, &'static str),
) -> BoxedFilter<(Response,)> {
    api.and(warp::path(parent_segment))
        .and(warp::path::param::<String>())
        .and(warp::path(child_segment))
        .and(warp::path::end())
        .and(with_source(source))
        .and_then(move |value: String, src| {
            handle(
                src,
                QueryRequest::hierarchical(parent_column, decode(&value), child_column),
            )
        })
        .boxed()
}

/// All query routes under `api_prefix`, plus `/health`.
pub fn routes(
    source: Arc<dyn SheetSource>,
    api_prefix: &str,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let api = prefix(api_prefix);

    let health = warp::path("health")
        .and(warp::path::end())
        .and_then(health_check);

    let all_data = api
        .clone()
        .and(warp::path("allData"))
        .and(warp::path::end())
        .and(with_source(source.clone()))
        .and_then(|src| handle(src, QueryRequest::DumpAll));

    let provinces = column_routes(api.clone(), source.clone(), "provinces", "Province");
    let districts = column_routes(api.clone(), source.clone(), "districts", "District");
    let schools = column_routes(api.clone(), source.clone(), "schools", "School");

    let districts_by_province = nested_route(
        api.clone(),
        source.clone(),
        ("provinces", "Province"),
        ("districts", "District"),
    );
    let schools_by_district = nested_route(
        api,
        source,
        ("districts", "District"),
        ("schools", "School"),
    );

    warp::get()
        .and(
            health
                .or(all_data)
                .unify()
                .or(provinces)
                .unify()
                .or(districts)
                .unify()
                .or(schools)
                .unify()
                .or(districts_by_province)
                .unify()
                .or(schools_by_district)
                .unify(),
        )
        .recover(handle_rejection)
        .unify()
        .with(warp::trace::request())
}

/// Bind and serve until the process exits.
pub async fn serve(source: Arc<dyn SheetSource>, api_prefix: &str, port: u16) {
    let base = if api_prefix.is_empty() {
        String::new()
    } else {
        format!("/{}", api_prefix)
    };
    info!("Server running at port: {}", port);
    info!("Health check: http://localhost:{}/health", port);
    info!(
        "Query routes: http://localhost:{}{}/allData, /provinces, /districts, /schools",
        port, base
    );

    warp::serve(routes(source, api_prefix))
        .run(([0, 0, 0, 0], port))
        .await;
}
