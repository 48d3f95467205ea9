fn main() -> anyhow::Result<()> {
    // Load .env early; ignore if missing.
    dotenvy::dotenv().ok();

    let raw_args: Vec<String> = std::env::args().collect();
    let parsed = match salary_analytics::parse_cli(raw_args) {
        Ok(parsed) => parsed,
        Err(err) => exit_with(&err),
    };

    match salary_analytics::run_with_parsed(parsed) {
        Ok(()) => Ok(()),
        Err(err) => exit_with(&err),
    }
}

fn exit_with(err: &salary_analytics::CliError) -> ! {
    eprintln!("{}", err.to_json());
    std::process::exit(err.code);
}
