use clap::Parser;
use stl_forge::core::ModelId;
use stl_forge::domain::model::ParameterBag;
use stl_forge::normalize;

#[derive(Parser)]
#[command(name = "forge-normalize")]
#[command(about = "Print the canonical parameters a generation request would forward")]
struct Args {
    /// Model identifier, e.g. cable_tray
    model: String,

    /// Parameter bag as a JSON object
    #[arg(default_value = "{}")]
    params: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let model = ModelId::parse(&args.model)?;
    let params: ParameterBag = serde_json::from_str(&args.params)?;

    if model.kind().is_none() {
        eprintln!("⚠️ Unknown model '{}', no per-model overrides applied", model);
    }

    let canonical = normalize(&model, &params);
    println!("{}", serde_json::to_string_pretty(&canonical)?);
    Ok(())
}
