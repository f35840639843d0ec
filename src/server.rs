use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    http::StatusCode,
    middleware::Logger,
    web, App, HttpResponse, HttpServer, ResponseError,
};
use anyhow::Context;
use log::{error, info};
use serde::Serialize;

use crate::{
    api::{GdpsClient, Upstream},
    config::Config,
    pipeline::{newest_rate, PipelineError, RetryPolicy},
    schema::ResponseEnvelope,
};

pub const NEWRATE_PATH: &str = "/api/newrate";

pub struct AppState<U> {
    pub upstream: U,
    pub retry: RetryPolicy,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl ResponseError for PipelineError {
    fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::ScanExhausted { .. } => StatusCode::BAD_GATEWAY,
            PipelineError::ScanTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            PipelineError::Details(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        error!("{self:#}");
        let error = match self {
            PipelineError::ScanExhausted { .. } => "Failed to find a recently rated level",
            PipelineError::ScanTimeout(_) => "Timed out while looking for a recently rated level",
            PipelineError::Details(_) => "Failed to fetch additional level info",
        };
        HttpResponse::build(self.status_code()).json(ErrorBody { error })
    }
}

async fn newrate<U: Upstream + 'static>(
    state: web::Data<AppState<U>>,
) -> Result<web::Json<ResponseEnvelope>, PipelineError> {
    Ok(web::Json(newest_rate(&state.upstream, &state.retry).await?))
}

async fn invalid_route() -> HttpResponse {
    HttpResponse::NotFound().body("Invalid route")
}

pub fn app<U: Upstream + 'static>(
    state: web::Data<AppState<U>>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(state)
        .service(
            web::resource(NEWRATE_PATH)
                .route(web::get().to(newrate::<U>))
                .default_service(web::to(invalid_route)),
        )
        .default_service(web::to(invalid_route))
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let upstream = GdpsClient::new(
        config.endpoints(),
        &config.user_agent,
        config.request_timeout,
    )
    .context("Failed to build the HTTP client")?;
    let state = web::Data::new(AppState {
        upstream,
        retry: config.retry,
    });

    info!(
        "Server is running on http://{}:{}{NEWRATE_PATH}",
        config.bind_address, config.port
    );
    HttpServer::new(move || app(state.clone()).wrap(Logger::default()))
        .bind((config.bind_address.as_str(), config.port))?
        .run()
        .await?;
    Ok(())
}
