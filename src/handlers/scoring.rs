//! # Similarity Scoring Stub
//!
//! Fakes the ML comparison service used during integration testing. The
//! handler sleeps a uniformly random, human-noticeable amount of time (the
//! "model inference"), then scores the two texts with plain word-set overlap.
//!
//! ## Endpoint:
//! `POST /analyze` with `{"vacancy_text": "...", "resume_text": "..."}`
//! returns `{"score": 0.85, "comment": "Stub analysis: ..."}`.

use crate::error::AppResult;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct SimilarityRequest {
    /// Full vacancy text
    pub vacancy_text: String,

    /// Full resume text
    pub resume_text: String,
}

#[derive(Debug, Serialize)]
pub struct SimilarityResponse {
    /// Similarity in [0.0, 1.0]
    pub score: f64,

    /// Reviewer-style commentary produced by the stub
    pub comment: String,
}

pub async fn analyze(
    state: web::Data<AppState>,
    request: web::Json<SimilarityRequest>,
) -> AppResult<HttpResponse> {
    info!("Received similarity analysis request");
    let scoring = state.get_config().scoring;

    // rand's thread-local RNG must not be held across an await point
    let delay_secs = {
        let mut rng = rand::thread_rng();
        rng.gen_range(scoring.min_delay_secs..=scoring.max_delay_secs)
    };
    info!(delay_secs, "Simulating model inference");
    tokio::time::sleep(Duration::from_secs_f64(delay_secs)).await;

    let score = jaccard_similarity(&request.vacancy_text, &request.resume_text);
    let comment = score_comment(score);
    info!(score, "Analysis complete");

    Ok(HttpResponse::Ok().json(SimilarityResponse { score, comment }))
}

/// Word-level Jaccard similarity: `|A ∩ B| / |A ∪ B|` over lowercased,
/// whitespace-split word sets. Returns 0.0 when both texts are empty.
fn jaccard_similarity(left: &str, right: &str) -> f64 {
    let left = left.to_lowercase();
    let right = right.to_lowercase();
    let left_words: HashSet<&str> = left.split_whitespace().collect();
    let right_words: HashSet<&str> = right.split_whitespace().collect();

    let union = left_words.union(&right_words).count();
    if union == 0 {
        return 0.0;
    }

    let intersection = left_words.intersection(&right_words).count();
    intersection as f64 / union as f64
}

/// Build the canned reviewer commentary for a score.
fn score_comment(score: f64) -> String {
    let mut comment = format!("Stub analysis: {:.1}% similarity. ", score * 100.0);
    comment.push_str(if score > 0.7 {
        "Strong overlap in key skills. Recommended for review."
    } else if score > 0.4 {
        "Partial overlap. Additional screening is advised."
    } else {
        "Low overlap. The candidate is unlikely to fit this role."
    });
    comment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use actix_web::{test, App};

    #[::core::prelude::v1::test]
    fn identical_texts_score_one() {
        assert_eq!(jaccard_similarity("rust tokio actix", "rust tokio actix"), 1.0);
    }

    #[::core::prelude::v1::test]
    fn disjoint_texts_score_zero() {
        assert_eq!(jaccard_similarity("rust tokio", "python django"), 0.0);
    }

    #[::core::prelude::v1::test]
    fn empty_texts_score_zero() {
        assert_eq!(jaccard_similarity("", ""), 0.0);
    }

    #[::core::prelude::v1::test]
    fn scoring_ignores_case_and_repeats() {
        assert_eq!(jaccard_similarity("Rust RUST rust", "rust"), 1.0);
    }

    #[::core::prelude::v1::test]
    fn partial_overlap_is_fractional() {
        // words: {rust, tokio, actix} vs {rust, tokio, python}
        // intersection 2, union 4
        assert_eq!(
            jaccard_similarity("rust tokio actix", "rust tokio python"),
            0.5
        );
    }

    #[::core::prelude::v1::test]
    fn comment_tiers_follow_score() {
        assert!(score_comment(0.9).contains("Strong overlap"));
        assert!(score_comment(0.5).contains("Partial overlap"));
        assert!(score_comment(0.1).contains("Low overlap"));
        assert!(score_comment(0.42).starts_with("Stub analysis: 42.0% similarity."));
    }

    #[actix_web::test]
    async fn analyze_returns_score_and_comment() {
        let mut config = AppConfig::default();
        config.scoring.min_delay_secs = 0.0;
        config.scoring.max_delay_secs = 0.0;
        let state = AppState::new(config);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/analyze", web::post().to(analyze)),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/analyze")
            .set_json(serde_json::json!({
                "vacancy_text": "senior rust backend engineer",
                "resume_text": "rust backend engineer with tokio experience"
            }))
            .to_request();

        let body: serde_json::Value = test::call_and_read_body_json(&app, request).await;
        let score = body["score"].as_f64().unwrap();
        assert!(score > 0.0 && score < 1.0);
        assert!(body["comment"].as_str().unwrap().starts_with("Stub analysis:"));
    }
}
