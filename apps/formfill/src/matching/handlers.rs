use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::matching::dates::{format_date, parse_at, parse_relative_date};
use crate::matching::fuzzy::match_option;

#[derive(Deserialize)]
pub struct MatchRequest {
    pub answer: String,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Serialize)]
pub struct MatchResponse {
    /// `null` means no option fits and the field should stay empty.
    pub matched: Option<String>,
}

/// POST /api/v1/match
pub async fn handle_match(Json(req): Json<MatchRequest>) -> Json<MatchResponse> {
    Json(MatchResponse {
        matched: match_option(&req.answer, &req.options),
    })
}

#[derive(Deserialize)]
pub struct DateParseRequest {
    pub text: String,
    /// Field format hint, e.g. "DD/MM/YYYY".
    #[serde(default)]
    pub format: Option<String>,
    /// Reference date; defaults to the server's local date.
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct DateParseResponse {
    pub date: Option<NaiveDate>,
    pub formatted: Option<String>,
}

/// POST /api/v1/dates/parse
pub async fn handle_parse_date(Json(req): Json<DateParseRequest>) -> Json<DateParseResponse> {
    let date = match req.today {
        Some(today) => parse_at(&req.text, today),
        None => parse_relative_date(&req.text),
    };
    Json(DateParseResponse {
        date,
        formatted: date.map(|d| format_date(d, req.format.as_deref())),
    })
}
