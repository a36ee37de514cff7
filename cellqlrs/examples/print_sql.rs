use std::{env, fs, path::PathBuf};

use cellql::{
    dialect_for, AggregateRequest, CellqlConfig, CompileContext, ListRequest, QueryCompiler,
    TemplateFormulaCompiler, Validator,
};
use tracing_subscriber::EnvFilter;

fn usage() {
    eprintln!("Usage: print_sql <metadata_dir> <request_json> [datasource]");
    eprintln!(
        "Example: cargo run --example print_sql -- demo demo/requests/orders_by_total.json reporting"
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1).collect::<Vec<_>>();
    if args.len() < 2 {
        usage();
        std::process::exit(1);
    }

    let metadata_dir = PathBuf::from(args.remove(0));
    let request_path = PathBuf::from(args.remove(0));
    let datasource = args.first().cloned().unwrap_or_else(|| "default".to_string());

    let config = CellqlConfig::load_default().for_datasource(&datasource);
    let registry = cellql::load_and_validate(&metadata_dir, &Validator::from_config(&config))?;
    let dialect = dialect_for(config.dialect);
    let formulas = TemplateFormulaCompiler;
    let compiler = QueryCompiler::new(CompileContext {
        provider: &registry,
        formulas: &formulas,
        dialect: dialect.as_ref(),
        config: &config.compiler,
    });

    let request: serde_json::Value = serde_json::from_str(&fs::read_to_string(request_path)?)?;
    if request.get("aggregations").is_some() {
        let request: AggregateRequest = serde_json::from_value(request)?;
        match compiler.build_aggregate_sql(&request).await? {
            Some(sql) => println!("{sql}"),
            None => eprintln!("no aggregation in the request could be compiled"),
        }
    } else {
        let request: ListRequest = serde_json::from_value(request)?;
        let sql = compiler.build_list_sql(&request).await?;
        println!("{sql}");
    }
    Ok(())
}
