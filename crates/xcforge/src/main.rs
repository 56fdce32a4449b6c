fn main() -> anyhow::Result<()> {
    xcforge::run()
}
