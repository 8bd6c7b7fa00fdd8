use anyhow::{bail, Context};
use std::env;
use tracing::{debug, info, instrument, warn};
use units_monitor::analytics::{self, Dimension, Metric};
use units_monitor::frame::to_dataframe;
use units_monitor::record::parse_decimal;
use units_monitor::{Config, Feedback, LogStore, PredictionService, SalesInput};

const USAGE: &str = "usage: units-monitor report | predict <price> <discount_pct> <category> <segment> [actual] [score] [text]";

fn main() -> anyhow::Result<()> {
    let config_path = env::var("UNITS_MONITOR_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::load(&config_path).with_context(|| format!("loading {config_path}"))?;

    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level())
        .init();
    debug!(?config, "config loaded");

    let store = LogStore::with_cache_ttl(&config.log_path, config.cache_ttl());
    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("report") | None => report(&store),
        Some("predict") => predict(&config, &store, &args[1..]),
        Some(other) => bail!("unknown command {other:?}\n{USAGE}"),
    }
}

#[instrument(skip_all)]
fn report(store: &LogStore) -> anyhow::Result<()> {
    let rows = store.load()?;
    if rows.is_empty() {
        warn!(path = %store.path().display(), "no monitoring logs found yet, submit a prediction first");
        return Ok(());
    }

    let frame = to_dataframe(&rows)?;
    debug!(shape = ?frame.shape(), "raw log frame built");

    let key = analytics::summary(&rows)?;
    info!(
        total = key.total_predictions,
        avg_feedback = ?key.avg_feedback_score,
        avg_latency_ms = ?key.avg_latency_ms,
        avg_predicted_units = ?key.avg_units_sold_pred,
        "key metrics"
    );

    for line in analytics::compare_models(&rows)? {
        info!(
            model = %line.model_version,
            avg_latency_ms = ?line.avg_latency_ms,
            mae = ?line.mae,
            evaluated = line.evaluated_rows,
            "model comparison"
        );
    }

    for (key, stats) in analytics::aggregate(&rows, &[Dimension::ModelVersion], Metric::UnitsSoldPred)? {
        info!(
            model = %key.join("/"),
            count = stats.count,
            mean = stats.mean,
            min = stats.min,
            max = stats.max,
            "predicted units distribution"
        );
    }

    for comment in analytics::recent_comments(&rows, 10) {
        info!(
            model = ?comment.model_version,
            score = ?comment.feedback_score,
            text = ?comment.feedback_text,
            "recent comment"
        );
    }
    Ok(())
}

#[instrument(skip(config, store))]
fn predict(config: &Config, store: &LogStore, args: &[String]) -> anyhow::Result<()> {
    let [price, discount, category, segment, rest @ ..] = args else {
        bail!(USAGE);
    };
    let input = SalesInput::new(
        parse_decimal("price", price)?,
        parse_decimal("discount_pct", discount)?,
        category.as_str(),
        segment.as_str(),
    )?;
    let feedback = Feedback {
        actual_units_sold: rest.first().map(|a| parse_decimal("actual_units_sold", a)).transpose()?,
        score: rest
            .get(1)
            .map(|s| s.trim().parse::<i64>().context("feedback score must be an integer"))
            .transpose()?,
        text: rest.get(2).cloned(),
    };

    let service = PredictionService::from_params(&config.models)?;
    let predictions = service.predict_all(&input)?;
    for prediction in &predictions {
        info!(
            model = %prediction.model_version,
            units = prediction.units_sold,
            latency_ms = prediction.latency_ms,
            "prediction"
        );
    }
    service.submit(store, &input, &predictions, &feedback)?;
    Ok(())
}
