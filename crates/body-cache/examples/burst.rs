use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue};
use micro_body_cache::BodyCacheContext;
use micro_body_cache::pipeline::BodyPipeline;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let context = BodyCacheContext::global();
    let _cleanup = context.start_cleanup();
    let pipeline = BodyPipeline::new(context);

    let mut json = HeaderMap::new();
    json.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let mut form = HeaderMap::new();
    form.insert(CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"));

    for i in 0..1000 {
        let (headers, body) = if i % 3 == 0 {
            (&form, Bytes::from(format!("user=zava&page={}", i % 7)))
        } else {
            (&json, Bytes::from(format!(r#"{{"user":"zava","page":{}}}"#, i % 11)))
        };

        if let Err(e) = pipeline.parse(headers, &[body]) {
            error!(cause = %e, "failed to parse body");
        }
    }

    match serde_json::to_string_pretty(&pipeline.context().stats()) {
        Ok(stats) => info!("cache stats after burst:\n{stats}"),
        Err(e) => error!(cause = %e, "failed to render stats"),
    }
}
