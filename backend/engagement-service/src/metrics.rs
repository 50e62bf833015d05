use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, TextEncoder};

static LIKE_TOGGLES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "engagement_like_toggles_total",
            "Like toggles handled, by result (liked/unliked/noop)",
        ),
        &["result"],
    )
    .expect("failed to create engagement_like_toggles_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register engagement_like_toggles_total");
    counter
});

static VIEWS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "engagement_views_total",
            "View submissions, by outcome (counted/deduplicated/below_threshold)",
        ),
        &["outcome"],
    )
    .expect("failed to create engagement_views_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register engagement_views_total");
    counter
});

static SESSION_TRANSITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "engagement_session_transitions_total",
            "Playback session transitions, by kind",
        ),
        &["transition"],
    )
    .expect("failed to create engagement_session_transitions_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register engagement_session_transitions_total");
    counter
});

static CACHE_LOOKUPS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "engagement_cache_lookups_total",
            "Counter cache lookups, by result (hit/miss/error)",
        ),
        &["result"],
    )
    .expect("failed to create engagement_cache_lookups_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register engagement_cache_lookups_total");
    counter
});

pub fn observe_toggle(result: &str) {
    LIKE_TOGGLES_TOTAL.with_label_values(&[result]).inc();
}

pub fn observe_view(outcome: &str) {
    VIEWS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn observe_session(transition: &str) {
    SESSION_TRANSITIONS_TOTAL
        .with_label_values(&[transition])
        .inc();
}

pub fn observe_cache_lookup(result: &str) {
    CACHE_LOOKUPS_TOTAL.with_label_values(&[result]).inc();
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
