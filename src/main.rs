fn main() -> anyhow::Result<()> {
    killtracker_lib::run()
}
