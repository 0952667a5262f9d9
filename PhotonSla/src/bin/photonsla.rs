//! `photonsla` command-line entry point

fn main() -> anyhow::Result<()> {
    photonsla::cli::run_cli()
}
