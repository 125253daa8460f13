fn main() -> anyhow::Result<()> {
    wattwatch_lib::run()
}
