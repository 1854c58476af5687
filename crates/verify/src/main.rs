fn main() -> anyhow::Result<()> {
    multipricelist_observability::init();

    let outcome = multipricelist_verify::run()?;
    for check in outcome.checks() {
        let status = if check.passed { "SUCCESS" } else { "FAILURE" };
        println!("{status}: {}", check.description);
    }

    if !outcome.passed() {
        anyhow::bail!("acceptance run failed");
    }
    Ok(())
}
