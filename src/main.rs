use probechain::app;
use probechain::settings::load_from_cli;

fn main() -> std::io::Result<()> {
    let settings = load_from_cli()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;

    app::run(settings).map_err(std::io::Error::other)?;
    Ok(())
}
