use dbcontext::{CommandKind, ContextOptions, DbContext, DbType, IsolationLevel, Parameter, Value};
use std::process::ExitCode;
use tracing::{error, info};

const USAGE: &str = "Usage: dbctx [--provider NAME --connection STRING | --setting NAME] \
[--param NAME=VALUE]... [--scalar] [--transaction] SQL";

#[derive(Debug, Default)]
struct Args {
    provider: Option<String>,
    connection: Option<String>,
    setting: Option<String>,
    params: Vec<Parameter>,
    scalar: bool,
    transaction: bool,
    sql: Option<String>,
}

fn parse_param(raw: &str) -> Result<Parameter, String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("--param expects NAME=VALUE, got '{}'", raw))?;
    let parameter = match value.parse::<i64>() {
        Ok(n) => Parameter::new(name, DbType::Int64, n),
        Err(_) => Parameter::new(name, DbType::String, Value::from(value)),
    };
    Ok(parameter)
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} requires a value", flag))
        };
        match arg.as_str() {
            "--provider" => parsed.provider = Some(value("--provider")?),
            "--connection" => parsed.connection = Some(value("--connection")?),
            "--setting" => parsed.setting = Some(value("--setting")?),
            "--param" => parsed.params.push(parse_param(&value("--param")?)?),
            "--scalar" => parsed.scalar = true,
            "--transaction" => parsed.transaction = true,
            flag if flag.starts_with("--") => return Err(format!("unknown option {}", flag)),
            sql if parsed.sql.is_none() => parsed.sql = Some(sql.to_string()),
            extra => return Err(format!("unexpected argument '{}'", extra)),
        }
    }
    Ok(parsed)
}

fn run(args: Args) -> dbcontext::Result<String> {
    let sql = args.sql.unwrap_or_default();
    let options = if args.transaction {
        ContextOptions::new().begin(IsolationLevel::ReadCommitted)
    } else {
        ContextOptions::new().open()
    };

    let mut context = match (args.provider, args.connection) {
        (Some(provider), Some(connection)) => {
            DbContext::with_provider(&provider, &connection, options)?
        }
        (None, None) => DbContext::from_setting(args.setting.as_deref().unwrap_or(""), options)?,
        _ => {
            return Err(dbcontext::DbError::invalid_argument(
                "connection",
                "--provider and --connection must be given together",
            ))
        }
    };
    info!(provider = context.provider_name(), "running statement");

    let output = if args.scalar {
        match context.execute_scalar_text(CommandKind::Text, &sql, &args.params)? {
            Some(value) => value.to_string(),
            None => "(no rows)".to_string(),
        }
    } else {
        let affected = context.execute_non_query_text(CommandKind::Text, &sql, &args.params)?;
        format!("{} row(s) affected", affected)
    };

    context.complete()?;
    context.dispose()?;
    Ok(output)
}

fn main() -> ExitCode {
    // Logs go to stderr so stdout carries only the result
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(args) if args.sql.as_deref().map(str::trim).is_some_and(|s| !s.is_empty()) => args,
        Ok(_) => {
            eprintln!("{}", USAGE);
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "statement failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
