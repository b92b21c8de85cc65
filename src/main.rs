fn main() -> anyhow::Result<()> {
    daynote::cli::run()
}
