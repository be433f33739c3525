//! HTTP handlers. The library does all the work; these only decode requests,
//! apply the configured policies and encode responses.

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use log::info;
use serde::{Deserialize, Serialize};

use crate::analytics::{CohortAnalyzer, CohortReport, RiskBucket};
use crate::config::ImportOptions;
use crate::data::{auto_map_fields, parse_delimited_text, CanonicalField, FieldMapping};
use crate::error::{Result, RiskError};
use crate::model::{generate_recommendations, PredictionResult, RiskLevel, RiskModel, ScoredStudent, StudentFeatures};

impl ResponseError for RiskError {
    fn status_code(&self) -> StatusCode {
        match self {
            RiskError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": self.to_string() }))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictResponse {
    pub prediction: PredictionResult,
    pub recommendations: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub risk_counts: Vec<RiskBucket>,
    pub avg_score: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub total_students: usize,
    pub predictions: Vec<PredictionResult>,
    pub summary: BatchSummary,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRequest {
    pub features: StudentFeatures,
    pub risk_level: RiskLevel,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub mapping: FieldMapping,
    pub unmapped: Vec<String>,
    pub missing_features: Vec<CanonicalField>,
    pub fields: Vec<CanonicalField>,
}

#[derive(Deserialize)]
pub struct ImportRequest {
    pub csv: String,
    #[serde(default)]
    pub mapping: Option<FieldMapping>,
}

#[derive(Serialize)]
pub struct ImportResponse {
    pub students: Vec<ScoredStudent>,
    pub analytics: CohortReport,
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().body("Student Risk API is running!")
}

async fn get_model_info(model: web::Data<RiskModel>) -> HttpResponse {
    HttpResponse::Ok().json(model.model_info())
}

async fn predict(
    req: web::Json<StudentFeatures>,
    model: web::Data<RiskModel>,
    options: web::Data<ImportOptions>,
) -> Result<HttpResponse> {
    let features = req.into_inner().normalize(options.input_policy)?;
    let prediction = model.predict(&features);
    let recommendations = generate_recommendations(&features, prediction.risk_level);

    Ok(HttpResponse::Ok().json(PredictResponse {
        prediction,
        recommendations,
    }))
}

async fn batch_predict(
    web::Json(students): web::Json<Vec<StudentFeatures>>,
    model: web::Data<RiskModel>,
    options: web::Data<ImportOptions>,
) -> Result<HttpResponse> {
    let features = students
        .into_iter()
        .map(|f| f.normalize(options.input_policy))
        .collect::<Result<Vec<_>>>()?;
    let predictions = model.predict_batch(&features);

    let total_students = predictions.len();
    let risk_counts = RiskLevel::ALL
        .iter()
        .map(|&level| RiskBucket {
            level,
            count: predictions.iter().filter(|p| p.risk_level == level).count(),
        })
        .collect();
    let avg_score = if total_students > 0 {
        predictions.iter().map(|p| p.score).sum::<f64>() / total_students as f64
    } else {
        0.0
    };

    Ok(HttpResponse::Ok().json(BatchResult {
        total_students,
        predictions,
        summary: BatchSummary { risk_counts, avg_score },
    }))
}

async fn recommendations(req: web::Json<RecommendationRequest>) -> HttpResponse {
    HttpResponse::Ok().json(generate_recommendations(&req.features, req.risk_level))
}

async fn import_preview(body: String) -> Result<HttpResponse> {
    let table = parse_delimited_text(&body)?;
    if table.headers.is_empty() {
        return Err(RiskError::EmptyInput);
    }

    let mapping = auto_map_fields(&table.headers);
    let unmapped = mapping.unmapped(&table.headers);
    let missing_features = mapping.missing_features();

    Ok(HttpResponse::Ok().json(ImportPreview {
        headers: table.headers,
        rows: table.rows,
        mapping,
        unmapped,
        missing_features,
        fields: CanonicalField::ALL.to_vec(),
    }))
}

async fn import(
    req: web::Json<ImportRequest>,
    model: web::Data<RiskModel>,
    options: web::Data<ImportOptions>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    let table = parse_delimited_text(&req.csv)?;
    if table.headers.is_empty() {
        return Err(RiskError::EmptyInput);
    }

    let mapping = req.mapping.unwrap_or_else(|| auto_map_fields(&table.headers));
    let students = model.score_import(&table, &mapping, &options)?;
    let analytics = CohortAnalyzer::new().report(&students);
    info!("import scored {} students", students.len());

    Ok(HttpResponse::Ok().json(ImportResponse { students, analytics }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/model/info", web::get().to(get_model_info))
        .route("/predict", web::post().to(predict))
        .route("/batch-predict", web::post().to(batch_predict))
        .route("/recommendations", web::post().to(recommendations))
        .route("/import/preview", web::post().to(import_preview))
        .route("/import", web::post().to(import));
}
