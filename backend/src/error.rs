use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    gpx_export::ExportError, loader::LoaderError, models::ApiError, prompt::PromptError,
    route_parser::RouteParseError, schedule::ScheduleError, supabase::SupabaseError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Route(#[from] RouteParseError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Places(#[from] SupabaseError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Network(#[from] LoaderError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0} is not configured")]
    Disabled(&'static str),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Route(_)
            | AppError::Prompt(_)
            | AppError::Export(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Places(_) | AppError::Schedule(_) => StatusCode::BAD_GATEWAY,
            AppError::Network(_) | AppError::Disabled(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("request failed: {self}");
        } else {
            tracing::debug!("rejected request: {self}");
        }
        let body = Json(ApiError {
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}
