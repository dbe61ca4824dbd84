use crate::{
    analysis::{
        Analysis, AnalysisOptions, build_explainer,
        formatter::{self, format_run},
        interactive::{self, Conversation},
        select_analyzers,
    },
    analyzer::{AnalyzerRegistry, ObjectRef},
    cli::{AnalyzeArgs, GlobalArgs, OutputFormat},
    config::{self, types::Config},
    error::ConfigError,
    kubernetes::KubeCluster,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn handle_analyze(
    args: AnalyzeArgs,
    global: &GlobalArgs,
    cancel: CancellationToken,
) -> crate::Result<()> {
    let config_path = config::resolve_config_path(global.config.as_deref())?;
    let config = config::load_config(&config_path)?;
    let options = analysis_options(&args, &config, global.quiet)?;

    // Selection, provider and cache problems surface before the cluster is contacted
    let registry = AnalyzerRegistry::builtin();
    let analyzers = select_analyzers(&registry, &options)?;
    let explainer = build_explainer(&config, &options).await?;

    let cluster =
        KubeCluster::connect(global.kubeconfig.as_deref(), global.kube_context.as_deref()).await?;
    let mut analysis =
        Analysis::from_selection(Arc::new(cluster), analyzers, &options).with_cancellation(cancel.clone());
    if let Some(explainer) = explainer {
        analysis = analysis.with_explainer(explainer);
    }

    let run = analysis.run().await?;
    if run.cancelled {
        log::warn!("Analysis interrupted; the report is partial");
    }

    let output = format_run(&run, formatter::OutputFormat::from(args.output))?;
    let report = output.trim_end();
    println!("{}", report);

    if args.interactive && !run.cancelled {
        if let Some(explainer) = analysis.explainer() {
            let conversation = Conversation::new(explainer.provider(), report, &run)?;
            let mut questions = interactive::stdin_lines();
            interactive::follow_up(&conversation, &mut questions, &mut std::io::stdout(), &cancel).await?;
        }
    }
    Ok(())
}

/// Merge flags over the configured defaults.
pub fn analysis_options(
    args: &AnalyzeArgs,
    config: &Config,
    quiet: bool,
) -> Result<AnalysisOptions, ConfigError> {
    let objects = args
        .object
        .iter()
        .map(|o| {
            o.parse::<ObjectRef>().map_err(|reason| ConfigError::InvalidValue {
                field: "object".to_string(),
                reason,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let filters = if args.filter.is_empty() {
        config.analysis.filters.clone()
    } else {
        args.filter.clone()
    };

    let max_concurrency = args.max_concurrency.unwrap_or(config.analysis.max_concurrency);
    if max_concurrency == 0 {
        return Err(ConfigError::InvalidValue {
            field: "max-concurrency".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(AnalysisOptions {
        namespace: args.namespace.clone(),
        filters,
        objects,
        max_concurrency,
        explain: args.explain,
        backend: args.backend.clone(),
        language: args.language.clone(),
        no_cache: args.no_cache,
        anonymize: args.anonymize,
        with_doc: args.with_doc,
        show_progress: args.output == OutputFormat::Text && !quiet,
    })
}
