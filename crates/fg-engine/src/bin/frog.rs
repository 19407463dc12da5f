use anyhow::Context;
use fg_engine::{Controller, EvaluationBridge, FunctionModel, ProgressEvent, ProgressSink};
use fg_solvers::SolverRegistry;
use fg_types::{OptimizationSettings, Variable};
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = match std::env::args().nth(1).or_else(|| std::env::var("FROG_SETTINGS").ok()) {
        Some(path) => OptimizationSettings::from_json_file(&path)
            .with_context(|| format!("failed to load settings from {path}"))?,
        None => OptimizationSettings::default().with_max_iterations(500),
    };
    let runs = settings.runs;

    let bounds = Variable::continuous(Decimal::ZERO, Decimal::TEN);
    let mut model = FunctionModel::new(vec![bounds.clone(), bounds], |x: &[f64]| {
        (x[0] - 3.0).powi(2) + (x[1] - 7.0).powi(2)
    })
    .with_document_path("bowl.model");

    let (client, server) = EvaluationBridge::new();
    let (progress, events) = ProgressSink::channel();
    let worker = Controller::new(settings, SolverRegistry::with_defaults(), client)
        .with_progress(progress)
        .spawn(runs)?;

    let handled = server.serve(&mut model);
    let report = worker.join()?;
    info!(batch = %report.id, handled, "Host finished serving requests");

    for event in events.try_iter() {
        if let ProgressEvent::RunFinished {
            run,
            result_type,
            value,
            iterations,
        } = event
        {
            println!("run {run}: {result_type} after {iterations} evaluations, value {value}");
        }
    }
    println!("{}", report.message);
    Ok(())
}
