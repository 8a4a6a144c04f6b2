/// HTTP handlers for recs-service
pub mod health;
pub mod metadata;
pub mod recommendation;

use actix_web::web;

/// Register every route except `/metrics`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health::index)
        .service(health::healthz)
        .service(recommendation::recs_for_me)
        .service(metadata::tmdb_ping)
        .service(metadata::film_count);
}

/// Split a comma-separated query value, trimming and dropping empties
pub(crate) fn split_csv(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_csv() {
        assert_eq!(split_csv(Some(" Sci-Fi, ,Horror ,")), vec!["Sci-Fi", "Horror"]);
        assert!(split_csv(Some("")).is_empty());
        assert!(split_csv(None).is_empty());
    }
}
